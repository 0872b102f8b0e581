//! SQLite backend for the Carelink position store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Besides positions, the same file holds
//! stand-in tables for the identity layer, links and client profiles, which
//! the service only ever reads.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
