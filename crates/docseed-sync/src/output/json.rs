use tokio::io::{AsyncWrite, AsyncWriteExt};

use docseed_core::{Document, Result};

/// Incremental writer for the export shape `{"name":[doc,...],...}`.
///
/// Output is byte-identical to compact `serde_json` serialization of the
/// equivalent [`docseed_core::CollectionTable`]. Each call awaits the sink,
/// so a slow sink holds back the producer one document at a time.
pub struct JsonStreamWriter<'w, W> {
    sink: &'w mut W,
    first_member: bool,
    first_element: bool,
    bytes: u64,
}

impl<'w, W: AsyncWrite + Unpin> JsonStreamWriter<'w, W> {
    pub fn new(sink: &'w mut W) -> Self {
        Self {
            sink,
            first_member: true,
            first_element: true,
            bytes: 0,
        }
    }

    pub async fn begin_object(&mut self) -> Result<()> {
        self.write(b"{").await
    }

    /// Start the array for collection `name`.
    pub async fn begin_array(&mut self, name: &str) -> Result<()> {
        if !self.first_member {
            self.write(b",").await?;
        }
        self.first_member = false;
        self.first_element = true;

        let key = serde_json::to_vec(name).map_err(std::io::Error::from)?;
        self.write(&key).await?;
        self.write(b":[").await
    }

    pub async fn element(&mut self, document: &Document) -> Result<()> {
        if !self.first_element {
            self.write(b",").await?;
        }
        self.first_element = false;

        let encoded = serde_json::to_vec(document).map_err(std::io::Error::from)?;
        self.write(&encoded).await
    }

    pub async fn end_array(&mut self) -> Result<()> {
        self.write(b"]").await
    }

    /// Close the object, flush and shut the sink down; returns bytes written.
    pub async fn finish(mut self) -> Result<u64> {
        self.write(b"}").await?;
        self.sink.flush().await?;
        self.sink.shutdown().await?;
        Ok(self.bytes)
    }

    async fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.sink.write_all(buf).await?;
        self.bytes = self.bytes.saturating_add(buf.len() as u64);
        Ok(())
    }
}
