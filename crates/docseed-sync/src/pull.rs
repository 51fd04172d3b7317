use std::time::Instant;

use futures::TryStreamExt;
use tokio::io::AsyncWrite;
use tracing::info;

use docseed_core::{CollectionTable, Result};
use docseed_store::{Store, connect};

use crate::model::PullOptions;
use crate::output::json::JsonStreamWriter;

/// Export the store at `uri` into memory.
pub async fn pull(uri: &str, options: &PullOptions) -> Result<CollectionTable> {
    let store = connect(uri).await?;
    pull_from_store(store.as_ref(), options).await
}

/// Export the store at `uri` as JSON into `sink`; returns bytes written.
pub async fn pull_to_stream<W>(uri: &str, sink: &mut W, options: &PullOptions) -> Result<u64>
where
    W: AsyncWrite + Unpin + Send,
{
    let store = connect(uri).await?;
    pull_to_stream_from_store(store.as_ref(), sink, options).await
}

/// Materialize every selected collection of an open store.
pub async fn pull_from_store(store: &dyn Store, options: &PullOptions) -> Result<CollectionTable> {
    let timer = Instant::now();
    let names = select_collections(store, options).await?;
    info!(event = "pull_started", engine = store.engine(), collections = names.len());

    let mut table = CollectionTable::new();
    for name in names {
        let documents = store.find_all(&name, options.query.as_ref()).await?;
        info!(event = "collection_pulled", collection = %name, documents = documents.len());
        table.insert(name, documents);
    }

    info!(
        event = "pull_finished",
        documents = table.document_count(),
        duration_ms = timer.elapsed().as_millis() as u64
    );
    Ok(table)
}

/// Stream every selected collection of an open store as one JSON object.
///
/// Collections are visited in selection order and documents are written as
/// the cursor yields them, so at most one document is buffered.
pub async fn pull_to_stream_from_store<W>(
    store: &dyn Store,
    sink: &mut W,
    options: &PullOptions,
) -> Result<u64>
where
    W: AsyncWrite + Unpin + Send,
{
    let timer = Instant::now();
    let names = select_collections(store, options).await?;
    info!(event = "pull_started", engine = store.engine(), collections = names.len(), streaming = true);

    let mut writer = JsonStreamWriter::new(sink);
    writer.begin_object().await?;
    for name in names {
        writer.begin_array(&name).await?;
        let mut cursor = store.find(&name, options.query.as_ref()).await?;
        let mut count = 0_u64;
        while let Some(document) = cursor.try_next().await? {
            writer.element(&document).await?;
            count += 1;
        }
        writer.end_array().await?;
        info!(event = "collection_pulled", collection = %name, documents = count);
    }
    let bytes = writer.finish().await?;

    info!(
        event = "pull_finished",
        bytes,
        duration_ms = timer.elapsed().as_millis() as u64
    );
    Ok(bytes)
}

async fn select_collections(store: &dyn Store, options: &PullOptions) -> Result<Vec<String>> {
    match &options.collection {
        Some(name) => Ok(vec![name.clone()]),
        None => store.list_collections().await,
    }
}
