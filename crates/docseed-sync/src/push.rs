use std::path::Path;
use std::time::Instant;

use tracing::{debug, info};

use docseed_core::{CollectionTable, Document, Result};
use docseed_resolve::{load_document, prepare};
use docseed_store::{Store, connect};

use crate::model::{CollectionReport, PushOptions, PushReport};

/// Seed the store at `uri` from a raw document.
///
/// `source` is the path the document was read from; it is only required
/// when the document uses `$require`.
pub async fn push(
    uri: &str,
    raw: &Document,
    source: Option<&Path>,
    options: &PushOptions,
) -> Result<PushReport> {
    let store = connect(uri).await?;
    push_to_store(store.as_ref(), raw, source, options).await
}

/// Load a seed file and push it to the store at `uri`.
pub async fn push_file(uri: &str, path: &Path, options: &PushOptions) -> Result<PushReport> {
    let raw = load_document(path)?;
    push(uri, &raw, Some(path), options).await
}

/// Compose, resolve and insert a raw document into an open store.
pub async fn push_to_store(
    store: &dyn Store,
    raw: &Document,
    source: Option<&Path>,
    options: &PushOptions,
) -> Result<PushReport> {
    let table = prepare(raw, source)?;
    push_collections(store, table, options).await
}

/// Insert already resolved collections, in table order.
///
/// A failing insert aborts the push; collections inserted before it stay.
pub async fn push_collections(
    store: &dyn Store,
    table: CollectionTable,
    options: &PushOptions,
) -> Result<PushReport> {
    let timer = Instant::now();
    info!(
        event = "push_started",
        engine = store.engine(),
        collections = table.len(),
        documents = table.document_count(),
        drop_database = options.drop_database
    );

    let mut report = PushReport::default();
    if options.drop_database {
        store.drop_database().await?;
        report.dropped = true;
        info!(event = "database_dropped", engine = store.engine());
    }

    for (name, documents) in table {
        let count = documents.len() as u64;
        if documents.is_empty() {
            debug!(collection = %name, "skipping empty collection");
        } else {
            store.insert_many(&name, documents).await?;
            info!(event = "collection_inserted", collection = %name, documents = count);
        }
        report.collections.push(CollectionReport {
            collection: name,
            documents: count,
        });
    }

    info!(
        event = "push_finished",
        documents = report.documents_total(),
        duration_ms = timer.elapsed().as_millis() as u64
    );
    Ok(report)
}
