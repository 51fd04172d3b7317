//! Document store adapters.
//!
//! The sync layer talks to stores only through the [`Store`] trait; backends
//! are picked from the URI scheme by [`connect`].

pub mod adapter;
pub mod connect;
pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongo;
pub mod query;

pub use adapter::{DocumentStream, Store};
pub use connect::connect;
pub use memory::InMemoryStore;
#[cfg(feature = "mongodb")]
pub use mongo::MongoStore;
pub use query::matches_query;
