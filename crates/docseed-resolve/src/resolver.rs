use std::collections::HashMap;

use docseed_core::{
    CollectionTable, Document, EVAL, EXTEND, Error, FragmentTable, Mapping, REQUIRE, Result,
    SIGIL, is_directive_key,
};
use serde_json::Value;
use tracing::debug;

use crate::eval::{Evaluator, ExpressionEvaluator};

/// Fragments resolved during one pass, keyed by bare name.
type Memo = HashMap<String, Document>;

/// Expands `$extend` and `$eval` directives against a fragment table.
///
/// Every call to [`Resolver::resolve`] or [`Resolver::resolve_collections`]
/// is one pass: fragments are resolved on first reference and memoized until
/// the pass ends. Input trees are never modified.
#[derive(Debug, Clone)]
pub struct Resolver<'a, E = ExpressionEvaluator> {
    fragments: &'a FragmentTable,
    evaluator: E,
}

impl<'a> Resolver<'a, ExpressionEvaluator> {
    pub fn new(fragments: &'a FragmentTable) -> Self {
        Self::with_evaluator(fragments, ExpressionEvaluator)
    }
}

impl<'a, E: Evaluator> Resolver<'a, E> {
    pub fn with_evaluator(fragments: &'a FragmentTable, evaluator: E) -> Self {
        Self {
            fragments,
            evaluator,
        }
    }

    /// Resolve a single tree into a directive-free tree.
    pub fn resolve(&self, tree: &Document) -> Result<Document> {
        let mut memo = Memo::new();
        self.resolve_node(tree, &mut Vec::new(), &mut memo)
    }

    /// Resolve every collection definition; each must yield a sequence.
    pub fn resolve_collections(&self, collections: &Mapping) -> Result<CollectionTable> {
        let mut memo = Memo::new();
        let mut table = CollectionTable::new();

        for (name, raw) in collections {
            match self.resolve_node(raw, &mut Vec::new(), &mut memo)? {
                Value::Array(documents) => {
                    debug!(collection = %name, documents = documents.len(), "collection resolved");
                    table.insert(name.clone(), documents);
                }
                other => {
                    return Err(Error::invalid(format!(
                        "collection '{name}' must resolve to a sequence of documents, got {}",
                        kind(&other)
                    )));
                }
            }
        }

        Ok(table)
    }

    fn resolve_node(
        &self,
        node: &Document,
        stack: &mut Vec<String>,
        memo: &mut Memo,
    ) -> Result<Document> {
        match node {
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_node(item, stack, memo))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => self.resolve_mapping(map, stack, memo),
            scalar => Ok(scalar.clone()),
        }
    }

    fn resolve_mapping(
        &self,
        map: &Mapping,
        stack: &mut Vec<String>,
        memo: &mut Memo,
    ) -> Result<Document> {
        if map.contains_key(REQUIRE) {
            return Err(Error::invalid("$require must be composed before resolution"));
        }

        if let Some(target) = map.get(EXTEND) {
            if map.contains_key(EVAL) {
                return Err(Error::invalid("$extend and $eval cannot share a mapping"));
            }
            let name = directive_str(EXTEND, target)?;
            let base = self.resolve_fragment(name, stack, memo)?;

            let overrides: Vec<(&String, &Value)> =
                map.iter().filter(|(key, _)| key.as_str() != EXTEND).collect();
            if overrides.is_empty() {
                return Ok(base);
            }
            let Value::Object(base) = base else {
                return Err(Error::invalid(format!(
                    "fragment '{name}' resolves to {} and cannot take overrides",
                    kind(&base)
                )));
            };
            return self
                .resolve_entries(base, overrides, stack, memo)
                .map(Value::Object);
        }

        if map.contains_key(EVAL) {
            // Not a direct mapping child, so there is no enclosing mapping to bind.
            let source = eval_source(map)?;
            return self.evaluate(source, &Mapping::new());
        }

        self.resolve_entries(Mapping::new(), map.iter().collect(), stack, memo)
            .map(Value::Object)
    }

    /// Resolve `entries` on top of `out`.
    ///
    /// Plain entries are resolved first; `$eval` entries are then evaluated in
    /// document order against the resolved mapping, keeping their original
    /// key positions.
    fn resolve_entries(
        &self,
        mut out: Mapping,
        entries: Vec<(&String, &Value)>,
        stack: &mut Vec<String>,
        memo: &mut Memo,
    ) -> Result<Mapping> {
        let mut pending: Vec<(&String, &str)> = Vec::new();

        for (key, value) in entries {
            match as_eval(value)? {
                Some(source) => {
                    out.insert(key.clone(), Value::Null);
                    pending.push((key, source));
                }
                None => {
                    let resolved = self.resolve_node(value, stack, memo)?;
                    out.insert(key.clone(), resolved);
                }
            }
        }

        for idx in 0..pending.len() {
            let (key, source) = pending[idx];
            let unevaluated = &pending[idx..];
            let context: Mapping = out
                .iter()
                .filter(|(name, _)| !unevaluated.iter().any(|(waiting, _)| waiting == name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            let value = self.evaluate(source, &context)?;
            out.insert(key.clone(), value);
        }

        Ok(out)
    }

    /// Evaluate an expression; its result must not reintroduce directives.
    fn evaluate(&self, source: &str, context: &Mapping) -> Result<Document> {
        let value = self.evaluator.evaluate(source, context)?;
        match find_directive(&value) {
            Some(key) => Err(Error::Evaluation {
                expression: source.to_string(),
                message: format!("result contains reserved key '{key}'"),
            }),
            None => Ok(value),
        }
    }

    fn resolve_fragment(
        &self,
        name: &str,
        stack: &mut Vec<String>,
        memo: &mut Memo,
    ) -> Result<Document> {
        let name = name.strip_prefix(SIGIL).unwrap_or(name);

        if let Some(resolved) = memo.get(name) {
            return Ok(resolved.clone());
        }

        if let Some(start) = stack.iter().position(|active| active == name) {
            let mut chain = stack[start..].to_vec();
            chain.push(name.to_string());
            return Err(Error::CyclicExtend { chain });
        }

        let fragment = self
            .fragments
            .get(name)
            .ok_or_else(|| Error::UnknownFragment(name.to_string()))?;

        stack.push(name.to_string());
        let resolved = self.resolve_node(fragment, stack, memo);
        stack.pop();
        let resolved = resolved?;

        debug!(fragment = %name, "fragment resolved");
        memo.insert(name.to_string(), resolved.clone());
        Ok(resolved)
    }
}

fn find_directive(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) => map
            .keys()
            .map(String::as_str)
            .find(|key| is_directive_key(key))
            .or_else(|| map.values().find_map(find_directive)),
        Value::Array(items) => items.iter().find_map(find_directive),
        _ => None,
    }
}

fn as_eval(value: &Value) -> Result<Option<&str>> {
    match value {
        Value::Object(map) if map.contains_key(EVAL) && !map.contains_key(EXTEND) => {
            eval_source(map).map(Some)
        }
        _ => Ok(None),
    }
}

fn eval_source(map: &Mapping) -> Result<&str> {
    if map.len() != 1 {
        return Err(Error::invalid("$eval cannot be combined with other keys"));
    }
    let source = map.get(EVAL).unwrap_or(&Value::Null);
    directive_str(EVAL, source)
}

fn directive_str<'v>(directive: &str, value: &'v Value) -> Result<&'v str> {
    value
        .as_str()
        .ok_or_else(|| Error::invalid(format!("{directive} expects a string, got {}", kind(value))))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(fragments: Value) -> FragmentTable {
        let mut table = FragmentTable::new();
        for (name, value) in fragments.as_object().expect("object") {
            table.insert(name.clone(), value.clone());
        }
        table
    }

    fn resolve(tree: Value, fragments: Value) -> Result<Value> {
        let fragments = table(fragments);
        Resolver::new(&fragments).resolve(&tree)
    }

    #[test]
    fn plain_trees_resolve_to_themselves() {
        let tree = json!({
            "name": "Ada",
            "tags": ["x", 1, null, {"deep": [true, 2.5]}],
            "empty": {}
        });
        assert_eq!(resolve(tree.clone(), json!({})).expect("resolve"), tree);
        assert_eq!(resolve(json!(42), json!({})).expect("resolve"), json!(42));
    }

    #[test]
    fn extend_without_overrides_yields_fragment() {
        let resolved = resolve(json!({"$extend": "test"}), json!({"test": {"a": 1, "b": 2}}));
        assert_eq!(resolved.expect("resolve"), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn extend_overrides_replace_base_keys() {
        let resolved = resolve(
            json!({"$extend": "test", "b": 3, "c": 4}),
            json!({"test": {"a": 1, "b": 2}}),
        )
        .expect("resolve");
        assert_eq!(resolved, json!({"a": 1, "b": 3, "c": 4}));
        let keys: Vec<&String> = resolved.as_object().expect("object").keys().collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    #[test]
    fn overrides_replace_nested_values_wholesale() {
        let resolved = resolve(
            json!({"$extend": "test", "meta": {"y": 2}}),
            json!({"test": {"meta": {"x": 1}}}),
        );
        assert_eq!(resolved.expect("resolve"), json!({"meta": {"y": 2}}));
    }

    #[test]
    fn recursive_extend_resolves_transitively() {
        let resolved = resolve(
            json!({"$extend": "test"}),
            json!({"base": {"c": 1}, "test": {"a": 1, "b": {"$extend": "base"}}}),
        );
        assert_eq!(resolved.expect("resolve"), json!({"a": 1, "b": {"c": 1}}));
    }

    #[test]
    fn fragment_extending_fragment_merges_layers() {
        let resolved = resolve(
            json!({"$extend": "admin", "name": "root"}),
            json!({
                "user": {"name": "anon", "role": "user", "active": true},
                "admin": {"$extend": "user", "role": "admin"}
            }),
        );
        assert_eq!(
            resolved.expect("resolve"),
            json!({"name": "root", "role": "admin", "active": true})
        );
    }

    #[test]
    fn sigil_prefixed_names_are_accepted() {
        let resolved = resolve(json!({"$extend": "$test"}), json!({"test": {"a": 1}}));
        assert_eq!(resolved.expect("resolve"), json!({"a": 1}));
    }

    #[test]
    fn self_extension_is_a_cycle() {
        let err = resolve(json!({"$extend": "me"}), json!({"me": {"$extend": "me"}}))
            .expect_err("cycle");
        match err {
            Error::CyclicExtend { chain } => assert_eq!(chain, ["me", "me"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn transitive_self_extension_is_a_cycle() {
        let err = resolve(
            json!({"$extend": "a"}),
            json!({
                "a": {"x": {"$extend": "b"}},
                "b": {"$extend": "c", "y": 1},
                "c": [{"$extend": "a"}]
            }),
        )
        .expect_err("cycle");
        match err {
            Error::CyclicExtend { chain } => assert_eq!(chain, ["a", "b", "c", "a"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn diamond_references_are_not_cycles() {
        let resolved = resolve(
            json!({"left": {"$extend": "l"}, "right": {"$extend": "r"}}),
            json!({"base": {"v": 1}, "l": {"$extend": "base"}, "r": {"$extend": "base"}}),
        );
        assert_eq!(
            resolved.expect("resolve"),
            json!({"left": {"v": 1}, "right": {"v": 1}})
        );
    }

    #[test]
    fn unknown_fragment_is_reported() {
        let err = resolve(json!({"$extend": "ghost"}), json!({})).expect_err("unknown");
        assert!(matches!(err, Error::UnknownFragment(name) if name == "ghost"));
    }

    #[test]
    fn eval_reads_enclosing_mapping() {
        let resolved = resolve(json!({"a": 1, "b": {"$eval": "this.a"}}), json!({}));
        assert_eq!(resolved.expect("resolve"), json!({"a": 1, "b": 1}));
    }

    #[test]
    fn eval_sees_later_plain_siblings_and_earlier_evals() {
        let resolved = resolve(
            json!({
                "full": {"$eval": "this.first + ' ' + this.last"},
                "first": "Ada",
                "last": "Lovelace",
                "shout": {"$eval": "this.full.toUpperCase()"}
            }),
            json!({}),
        )
        .expect("resolve");
        assert_eq!(
            resolved,
            json!({
                "full": "Ada Lovelace",
                "first": "Ada",
                "last": "Lovelace",
                "shout": "ADA LOVELACE"
            })
        );
        let keys: Vec<&String> = resolved.as_object().expect("object").keys().collect();
        assert_eq!(keys, ["full", "first", "last", "shout"]);
    }

    #[test]
    fn eval_in_extend_override_sees_base_fields() {
        let resolved = resolve(
            json!({"$extend": "person", "email": {"$eval": "this.name + '@example.com'"}}),
            json!({"person": {"name": "ada"}}),
        );
        assert_eq!(
            resolved.expect("resolve"),
            json!({"name": "ada", "email": "ada@example.com"})
        );
    }

    #[test]
    fn eval_in_sequence_has_empty_context() {
        let resolved = resolve(json!([{"$eval": "1 + 1"}, {"$eval": "this.a ?? 'none'"}]), json!({}));
        assert_eq!(resolved.expect("resolve"), json!([2, "none"]));
    }

    #[test]
    fn eval_failures_abort_resolution() {
        let err = resolve(json!({"a": {"$eval": "this.a +"}}), json!({})).expect_err("eval");
        assert!(matches!(err, Error::Evaluation { .. }));
    }

    #[test]
    fn malformed_directives_are_rejected() {
        let cases = [
            json!({"$extend": 1}),
            json!({"$eval": ["x"]}),
            json!({"x": {"$eval": "1", "y": 2}}),
            json!({"$extend": "f", "$eval": "1"}),
            json!({"$require": "other.yaml"}),
        ];
        for tree in cases {
            let err = resolve(tree.clone(), json!({"f": {}})).expect_err("invalid");
            assert!(matches!(err, Error::InvalidDocument(_)), "{tree}: {err:?}");
        }
    }

    #[test]
    fn overrides_on_scalar_fragment_are_rejected() {
        let err = resolve(json!({"$extend": "n", "x": 1}), json!({"n": 5})).expect_err("invalid");
        assert!(matches!(err, Error::InvalidDocument(_)));
        assert_eq!(resolve(json!({"$extend": "n"}), json!({"n": 5})).expect("scalar"), json!(5));
    }

    #[test]
    fn input_tree_is_left_untouched() {
        let fragments = table(json!({"f": {"a": 1}}));
        let tree = json!({"x": {"$extend": "f", "b": {"$eval": "this.a"}}});
        let before = tree.clone();
        let resolver = Resolver::new(&fragments);
        let first = resolver.resolve(&tree).expect("first");
        let second = resolver.resolve(&tree).expect("second");
        assert_eq!(tree, before);
        assert_eq!(first, second);
    }

    #[test]
    fn eval_results_cannot_carry_directives() {
        for source in ["{$extend: 'base'}", "[1, {nested: {'$eval': 'x'}}]"] {
            let err = resolve(json!({"v": {"$eval": source}}), json!({"base": {"a": 1}}))
                .expect_err("directive in result");
            match err {
                Error::Evaluation {
                    expression,
                    message,
                } => {
                    assert_eq!(expression, source);
                    assert!(message.contains("reserved key"), "{message}");
                }
                other => panic!("expected evaluation error, got {other:?}"),
            }
        }

        let plain = resolve(json!({"v": {"$eval": "{price: 1}"}}), json!({})).expect("resolve");
        assert_eq!(plain, json!({"v": {"price": 1}}));
    }

    #[test]
    fn custom_evaluators_are_used() {
        struct Constant;
        impl Evaluator for Constant {
            fn evaluate(&self, _source: &str, _context: &Mapping) -> Result<Document> {
                Ok(json!("constant"))
            }
        }

        let fragments = FragmentTable::new();
        let resolver = Resolver::with_evaluator(&fragments, Constant);
        let resolved = resolver
            .resolve(&json!({"v": {"$eval": "anything"}}))
            .expect("resolve");
        assert_eq!(resolved, json!({"v": "constant"}));
    }

    #[test]
    fn collections_must_resolve_to_sequences() {
        let fragments = table(json!({"list": [{"a": 1}]}));
        let resolver = Resolver::new(&fragments);

        let collections = json!({"things": {"$extend": "list"}});
        let table = resolver
            .resolve_collections(collections.as_object().expect("object"))
            .expect("resolve");
        assert_eq!(table.get("things"), Some(&[json!({"a": 1})][..]));

        let invalid = json!({"things": {"a": 1}});
        let err = resolver
            .resolve_collections(invalid.as_object().expect("object"))
            .expect_err("not a sequence");
        assert!(matches!(err, Error::InvalidDocument(_)));
    }
}
