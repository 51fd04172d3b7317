use serde::{Deserialize, Serialize};

use docseed_core::Document;

/// Options for seeding a store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushOptions {
    /// Drop the whole target database before inserting anything.
    #[serde(default)]
    pub drop_database: bool,
}

/// Options for exporting a store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullOptions {
    /// Export only this collection instead of every collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// Filter passed verbatim to the store for each collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Document>,
}

/// Documents written to one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionReport {
    pub collection: String,
    pub documents: u64,
}

/// Summary of a push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushReport {
    pub dropped: bool,
    pub collections: Vec<CollectionReport>,
}

impl PushReport {
    pub fn documents_total(&self) -> u64 {
        self.collections.iter().map(|report| report.documents).sum()
    }
}
