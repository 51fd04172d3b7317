use indexmap::IndexMap;

use crate::directive::{REQUIRE, fragment_name, is_directive_key};
use crate::error::{Error, Result};

/// A parsed document tree. Mappings keep insertion order.
pub type Document = serde_json::Value;

/// An insertion-ordered mapping node.
pub type Mapping = serde_json::Map<String, Document>;

/// Named fragments defined at the top level of a seed document.
///
/// Names are stored without the `$` sigil, the way `$extend` refers to them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentTable {
    fragments: IndexMap<String, Document>,
}

impl FragmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, fragment: Document) -> Option<Document> {
        self.fragments.insert(name.into(), fragment)
    }

    pub fn get(&self, name: &str) -> Option<&Document> {
        self.fragments.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fragments.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// A composed seed document split into its fragments and raw collections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedDocument {
    pub fragments: FragmentTable,
    /// Unresolved collection definitions in document order.
    pub collections: Mapping,
}

impl SeedDocument {
    /// Split a composed root document into fragments and collections.
    ///
    /// `$require` must already have been expanded, and the root itself may
    /// not carry `$extend` or `$eval`.
    pub fn split(root: &Document) -> Result<Self> {
        let map = root
            .as_object()
            .ok_or_else(|| Error::invalid("seed document root must be a mapping"))?;

        let mut seed = SeedDocument::default();
        for (key, value) in map {
            if key == REQUIRE {
                return Err(Error::invalid("$require must be composed before resolution"));
            }
            if is_directive_key(key) {
                return Err(Error::invalid(format!(
                    "{key} is not allowed at the document root"
                )));
            }
            match fragment_name(key) {
                Some(name) => {
                    seed.fragments.insert(name, value.clone());
                }
                None => {
                    seed.collections.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(seed)
    }
}
