use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use docseed_core::{Document, Error, Mapping, REQUIRE, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::loader::load_document;

/// Expand every `$require` in `root`, loaded from `root_path`.
///
/// Required files are resolved against the directory of the file holding
/// the directive and their top-level keys are merged into the root
/// namespace. Keys defined by the including document win over required
/// ones; between required files the later one wins.
pub fn compose(root: &Document, root_path: &Path) -> Result<Document> {
    let origin = root_path
        .canonicalize()
        .unwrap_or_else(|_| root_path.to_path_buf());
    let mut active = vec![origin];
    compose_in(root, base_dir(root_path), &mut active)
}

/// Returns true when any mapping in the tree carries `$require`.
pub fn contains_require(node: &Document) -> bool {
    match node {
        Value::Object(map) => map.contains_key(REQUIRE) || map.values().any(contains_require),
        Value::Array(items) => items.iter().any(contains_require),
        _ => false,
    }
}

fn compose_in(doc: &Document, base: &Path, active: &mut Vec<PathBuf>) -> Result<Document> {
    let Value::Object(map) = doc else {
        if contains_require(doc) {
            return Err(Error::invalid("a document using $require must be a mapping"));
        }
        return Ok(doc.clone());
    };

    let own_keys: HashSet<&str> = map
        .keys()
        .map(String::as_str)
        .filter(|key| *key != REQUIRE)
        .collect();
    let mut namespace = Namespace {
        out: Mapping::new(),
        own_keys,
        origins: HashMap::new(),
    };
    let mut deferred = Vec::new();

    for (key, value) in map {
        if key == REQUIRE {
            for target in require_targets(value)? {
                let imported = load_required(base, target, active)?;
                namespace.splice(imported, &base.join(target));
            }
            continue;
        }
        let stripped = strip_requires(value, &mut deferred)?;
        namespace.out.insert(key.clone(), stripped);
    }

    for target in deferred {
        let imported = load_required(base, &target, active)?;
        namespace.splice(imported, &base.join(&target));
    }

    Ok(Value::Object(namespace.out))
}

struct Namespace<'a> {
    out: Mapping,
    own_keys: HashSet<&'a str>,
    origins: HashMap<String, PathBuf>,
}

impl Namespace<'_> {
    fn splice(&mut self, imported: Mapping, source: &Path) {
        for (key, value) in imported {
            if self.own_keys.contains(key.as_str()) {
                debug!(key = %key, source = %source.display(), "local definition shadows required key");
                continue;
            }
            if let Some(previous) = self.origins.insert(key.clone(), source.to_path_buf()) {
                warn!(
                    key = %key,
                    previous = %previous.display(),
                    source = %source.display(),
                    "key defined by several required files, keeping the last"
                );
            }
            self.out.insert(key, value);
        }
    }
}

fn load_required(base: &Path, target: &str, active: &mut Vec<PathBuf>) -> Result<Mapping> {
    let path = base.join(target);
    let canonical = path
        .canonicalize()
        .map_err(|err| Error::compose(&path, format!("cannot read required file: {err}")))?;
    if active.contains(&canonical) {
        let chain = active
            .iter()
            .chain(std::iter::once(&canonical))
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        return Err(Error::compose(&path, format!("circular $require: {chain}")));
    }

    info!(event = "compose_require", path = %path.display());
    let doc = load_document(&path).map_err(|err| match err {
        Error::Parse { message, .. } => Error::compose(&path, message),
        Error::Io(err) => Error::compose(&path, err.to_string()),
        other => other,
    })?;

    active.push(canonical);
    let composed = compose_in(&doc, base_dir(&path), active);
    active.pop();

    match composed? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::compose(&path, "required file must contain a mapping")),
    }
}

/// Remove nested `$require` keys, collecting their targets.
fn strip_requires(node: &Document, targets: &mut Vec<String>) -> Result<Document> {
    match node {
        Value::Object(map) => {
            let mut out = Mapping::new();
            for (key, value) in map {
                if key == REQUIRE {
                    targets.extend(require_targets(value)?.into_iter().map(str::to_string));
                } else {
                    out.insert(key.clone(), strip_requires(value, targets)?);
                }
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| strip_requires(item, targets))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        scalar => Ok(scalar.clone()),
    }
}

fn require_targets(value: &Value) -> Result<Vec<&str>> {
    match value {
        Value::String(path) => Ok(vec![path.as_str()]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| Error::invalid("$require list entries must be paths"))
            })
            .collect(),
        _ => Err(Error::invalid("$require expects a path or a list of paths")),
    }
}

fn base_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new(""))
}
