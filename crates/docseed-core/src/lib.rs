//! Core contracts and helpers for docseed.
//!
//! This crate defines the document tree, the fragment and collection tables,
//! the directive vocabulary, and the error type shared by the resolver, the
//! store adapters and the CLI.

pub mod collection;
pub mod directive;
pub mod document;
pub mod error;
pub mod redaction;

pub use collection::CollectionTable;
pub use directive::{EVAL, EXTEND, REQUIRE, SIGIL, fragment_name, is_directive_key};
pub use document::{Document, FragmentTable, Mapping, SeedDocument};
pub use error::{Error, Result};
pub use redaction::{RedactedUri, redact_uri};
