use async_trait::async_trait;
use futures::TryStreamExt;
use futures::stream::BoxStream;

use docseed_core::{Document, Result};

/// Lazily produced documents of one collection, in store order.
pub type DocumentStream<'a> = BoxStream<'a, Result<Document>>;

/// Trait implemented by document stores that can be seeded and exported.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns the engine identifier (e.g. `mongodb`).
    fn engine(&self) -> &'static str;

    /// Drop the whole target database.
    async fn drop_database(&self) -> Result<()>;

    /// Insert documents into a collection, in order.
    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<()>;

    /// Collection names in the store's natural enumeration order.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Open a cursor over the documents of `collection` matching `query`.
    async fn find<'a>(
        &'a self,
        collection: &str,
        query: Option<&Document>,
    ) -> Result<DocumentStream<'a>>;

    /// Materialize every matching document.
    async fn find_all(&self, collection: &str, query: Option<&Document>) -> Result<Vec<Document>> {
        self.find(collection, query).await?.try_collect().await
    }
}
