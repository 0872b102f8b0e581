//! Core types, collaborator traits and services for Carelink location
//! sharing.
//!
//! No HTTP or database code lives here. The storage backend, geocoding
//! provider and HTTP surface live in their own crates and plug in through
//! the traits in [`store`] and [`geocode`].

// Trait methods return `impl Future + Send`; impls use plain `async fn`.
// The advisory lint about `Send` bounds does not apply.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod geo;
pub mod geocode;
pub mod home;
pub mod ingest;
pub mod locate;
pub mod position;
pub mod store;
pub mod subject;

pub use error::{Error, Result};
