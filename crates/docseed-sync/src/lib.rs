//! Push and pull orchestration for docseed (seeding and export).
//!
//! `push` runs compose -> resolve -> insert against a store; `pull` exports
//! collections either as an in-memory [`CollectionTable`] or streamed as JSON
//! to an async sink.

pub mod model;
pub mod output;
pub mod pull;
pub mod push;

pub use docseed_core::CollectionTable;
pub use model::{CollectionReport, PullOptions, PushOptions, PushReport};
pub use output::json::JsonStreamWriter;
pub use pull::{pull, pull_from_store, pull_to_stream, pull_to_stream_from_store};
pub use push::{push, push_collections, push_file, push_to_store};
