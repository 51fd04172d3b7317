//! Resolution engine for docseed seed documents.
//!
//! Turns a raw document tree into a [`CollectionTable`]: `$require` is
//! expanded by the composer, then `$extend` and `$eval` by the resolver.

pub mod compose;
pub mod eval;
pub mod loader;
pub mod resolver;

use std::path::Path;

use docseed_core::{CollectionTable, Document, Error, FragmentTable, Result, SeedDocument};
use tracing::debug;

pub use compose::{compose, contains_require};
pub use eval::{Evaluator, ExpressionEvaluator, evaluate};
pub use loader::{Format, load_document, parse_document};
pub use resolver::Resolver;

/// Resolve one tree against a fragment table.
pub fn resolve(tree: &Document, fragments: &FragmentTable) -> Result<Document> {
    Resolver::new(fragments).resolve(tree)
}

/// Resolve a composed root document into its collections.
pub fn resolve_document(root: &Document) -> Result<CollectionTable> {
    let seed = SeedDocument::split(root)?;
    debug!(
        fragments = seed.fragments.len(),
        collections = seed.collections.len(),
        "resolving seed document"
    );
    Resolver::new(&seed.fragments).resolve_collections(&seed.collections)
}

/// Compose and resolve a raw document.
///
/// `source` is only needed when the document uses `$require`.
pub fn prepare(raw: &Document, source: Option<&Path>) -> Result<CollectionTable> {
    let composed = match source {
        Some(path) => compose(raw, path)?,
        None if contains_require(raw) => {
            return Err(Error::Compose {
                path: None,
                message: "document uses $require but no source path was given".to_string(),
            });
        }
        None => raw.clone(),
    };
    resolve_document(&composed)
}

/// Load, compose and resolve a seed file.
pub fn prepare_file(path: &Path) -> Result<CollectionTable> {
    let raw = load_document(path)?;
    prepare(&raw, Some(path))
}
