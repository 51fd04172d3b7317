use docseed_core::{Error, Result, redact_uri};
use tracing::info;

use crate::adapter::Store;
use crate::memory::InMemoryStore;

/// Open the store a URI points at.
///
/// `memory://<database>` selects the process-local store; `mongodb://` and
/// `mongodb+srv://` need the `mongodb` feature.
pub async fn connect(uri: &str) -> Result<Box<dyn Store>> {
    let redacted = redact_uri(uri);
    let store: Box<dyn Store> = match redacted.scheme.as_deref() {
        Some("memory") => {
            let database = redacted
                .hosts
                .first()
                .or(redacted.database.as_ref())
                .map(String::as_str)
                .unwrap_or("default");
            Box::new(InMemoryStore::named(database)?)
        }
        Some("mongodb") | Some("mongodb+srv") => connect_mongo(uri).await?,
        _ => {
            return Err(Error::Store(format!(
                "unsupported store uri: {}",
                redacted.redacted
            )));
        }
    };

    info!(event = "store_connected", engine = store.engine(), uri = %redacted.redacted);
    Ok(store)
}

#[cfg(feature = "mongodb")]
async fn connect_mongo(uri: &str) -> Result<Box<dyn Store>> {
    Ok(Box::new(crate::mongo::MongoStore::connect(uri).await?))
}

#[cfg(not(feature = "mongodb"))]
async fn connect_mongo(_uri: &str) -> Result<Box<dyn Store>> {
    Err(Error::Store(
        "mongodb support is not compiled in; enable the `mongodb` feature".to_string(),
    ))
}
