use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use mongodb::bson::{Bson, Document as BsonDocument};
use mongodb::{Client, Database};

use docseed_core::{Document, Error, Result};

use crate::adapter::{DocumentStream, Store};

/// Adapter for MongoDB databases.
#[derive(Debug, Clone)]
pub struct MongoStore {
    database: Database,
}

impl MongoStore {
    /// Create a new adapter over a pre-configured database handle.
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Connect using a URI that names the target database.
    pub async fn connect(uri: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await.map_err(store_error)?;
        let database = client
            .default_database()
            .ok_or_else(|| Error::Store("connection uri must name a database".to_string()))?;
        Ok(Self::new(database))
    }
}

#[async_trait]
impl Store for MongoStore {
    fn engine(&self) -> &'static str {
        "mongodb"
    }

    async fn drop_database(&self) -> Result<()> {
        self.database.drop().await.map_err(store_error)
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let documents = documents
            .into_iter()
            .map(to_bson)
            .collect::<Result<Vec<_>>>()?;
        self.database
            .collection::<BsonDocument>(collection)
            .insert_many(documents)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.database
            .list_collection_names()
            .await
            .map_err(store_error)
    }

    async fn find<'a>(
        &'a self,
        collection: &str,
        query: Option<&Document>,
    ) -> Result<DocumentStream<'a>> {
        let filter = match query {
            Some(query) => to_bson(query.clone())?,
            None => BsonDocument::new(),
        };
        let cursor = self
            .database
            .collection::<BsonDocument>(collection)
            .find(filter)
            .await
            .map_err(store_error)?;
        Ok(cursor
            .map_err(store_error)
            .map_ok(|document| Bson::Document(document).into_relaxed_extjson())
            .boxed())
    }
}

/// Convert a document tree, reading extended JSON such as `{"$oid": ..}`.
fn to_bson(document: Document) -> Result<BsonDocument> {
    match Bson::try_from(document) {
        Ok(Bson::Document(document)) => Ok(document),
        Ok(other) => Err(Error::Store(format!(
            "expected a document, got {:?}",
            other.element_type()
        ))),
        Err(err) => Err(Error::Store(format!("cannot convert to bson: {err}"))),
    }
}

fn store_error(err: mongodb::error::Error) -> Error {
    Error::Store(err.to_string())
}
