use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::document::Document;

/// Ordered mapping from collection name to its documents.
///
/// Serializes as a single JSON object whose keys follow insertion order, the
/// shape both `push` consumes and `pull` produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionTable {
    collections: IndexMap<String, Vec<Document>>,
}

impl CollectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a collection, keeping its original position when replaced.
    pub fn insert(&mut self, name: impl Into<String>, documents: Vec<Document>) {
        self.collections.insert(name.into(), documents);
    }

    pub fn get(&self, name: &str) -> Option<&[Document]> {
        self.collections.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Document])> {
        self.collections
            .iter()
            .map(|(name, docs)| (name.as_str(), docs.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Total number of documents across all collections.
    pub fn document_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }
}

impl IntoIterator for CollectionTable {
    type Item = (String, Vec<Document>);
    type IntoIter = indexmap::map::IntoIter<String, Vec<Document>>;

    fn into_iter(self) -> Self::IntoIter {
        self.collections.into_iter()
    }
}

impl FromIterator<(String, Vec<Document>)> for CollectionTable {
    fn from_iter<I: IntoIterator<Item = (String, Vec<Document>)>>(iter: I) -> Self {
        Self {
            collections: iter.into_iter().collect(),
        }
    }
}
