use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use indexmap::IndexMap;
use serde_json::Value;

use docseed_core::{Document, Error, Mapping, Result};

use crate::adapter::{DocumentStream, Store};
use crate::query::matches_query;

type Collections = IndexMap<String, Vec<Document>>;

/// Process-local document store.
///
/// Collections enumerate in creation order and documents in insertion
/// order. Like MongoDB, documents get a generated `_id` when they have none,
/// and a duplicate `_id` in one collection rejects the insert.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<Mutex<Collections>>,
}

fn registry() -> &'static Mutex<HashMap<String, InMemoryStore>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, InMemoryStore>>> = OnceLock::new();
    REGISTRY.get_or_init(Mutex::default)
}

impl InMemoryStore {
    /// A fresh, unshared store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide store registered under `database`.
    ///
    /// Every call with the same name returns a handle to the same data, which
    /// is what `memory://<database>` URIs connect to. Registered databases
    /// are never evicted; they live until the process exits.
    pub fn named(database: &str) -> Result<Self> {
        let mut stores = registry()
            .lock()
            .map_err(|_| Error::Store("in-memory registry lock poisoned".to_string()))?;
        Ok(stores.entry(database.to_string()).or_default().clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>> {
        self.collections
            .lock()
            .map_err(|_| Error::Store("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    fn engine(&self) -> &'static str {
        "memory"
    }

    async fn drop_database(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let mut collections = self.lock()?;
        let existing = collections.get(collection).map(Vec::as_slice).unwrap_or(&[]);
        let mut seen: HashSet<String> = existing.iter().filter_map(id_key).collect();

        let mut prepared = Vec::with_capacity(documents.len());
        for document in documents {
            let document = with_id(document, collection)?;
            if let Some(id) = id_key(&document)
                && !seen.insert(id.clone())
            {
                return Err(Error::Store(format!(
                    "duplicate key {id} in collection '{collection}'"
                )));
            }
            prepared.push(document);
        }

        collections
            .entry(collection.to_string())
            .or_default()
            .extend(prepared);
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn find<'a>(
        &'a self,
        collection: &str,
        query: Option<&Document>,
    ) -> Result<DocumentStream<'a>> {
        let collections = self.lock()?;
        let documents = collections.get(collection).map(Vec::as_slice).unwrap_or(&[]);

        let mut selected = Vec::new();
        for document in documents {
            let keep = match query {
                Some(query) => matches_query(document, query)?,
                None => true,
            };
            if keep {
                selected.push(document.clone());
            }
        }

        Ok(stream::iter(selected.into_iter().map(Ok)).boxed())
    }
}

fn with_id(document: Document, collection: &str) -> Result<Document> {
    let Value::Object(map) = document else {
        return Err(Error::Store(format!(
            "documents inserted into '{collection}' must be mappings"
        )));
    };
    if map.contains_key("_id") {
        return Ok(Value::Object(map));
    }

    let mut out = Mapping::new();
    out.insert(
        "_id".to_string(),
        Value::String(uuid::Uuid::new_v4().simple().to_string()),
    );
    out.extend(map);
    Ok(Value::Object(out))
}

fn id_key(document: &Document) -> Option<String> {
    document.get("_id").map(Value::to_string)
}
