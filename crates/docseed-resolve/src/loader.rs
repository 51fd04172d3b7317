//! YAML/JSON front end producing ordered document trees.

use std::path::Path;

use docseed_core::{Document, Error, Result};

/// Input syntax of a seed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// `.json` files are JSON; everything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Yaml,
        }
    }
}

/// Read and parse a seed file.
pub fn load_document(path: &Path) -> Result<Document> {
    let contents = std::fs::read_to_string(path)?;
    parse_document(&contents, Format::from_path(path)).map_err(|err| match err {
        Error::Parse { message, .. } => Error::Parse {
            path: Some(path.to_path_buf()),
            message,
        },
        other => other,
    })
}

/// Parse in-memory text into a document tree.
pub fn parse_document(text: &str, format: Format) -> Result<Document> {
    let parsed = match format {
        Format::Json => serde_json::from_str(text).map_err(|err| err.to_string()),
        Format::Yaml => serde_yaml::from_str(text).map_err(|err| err.to_string()),
    };
    parsed.map_err(|message| Error::Parse {
        path: None,
        message,
    })
}
