//! JSON REST API for Carelink location sharing.
//!
//! Exposes an axum [`Router`] backed by any store implementing the
//! `carelink-core` collaborator traits and any [`Geocoder`]. Auth, TLS, and
//! transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", carelink_api::api_router(store.clone(), geocoder.clone()))
//! ```

pub mod clients;
pub mod error;
pub mod etag;
pub mod links;
pub mod positions;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use carelink_core::{
  geocode::Geocoder,
  store::{IdentityDirectory, LinkDirectory, PositionStore, ProfileDirectory},
};

pub use error::ApiError;

/// Everything the handlers need from a storage backend.
pub trait Backend:
  PositionStore + IdentityDirectory + LinkDirectory + ProfileDirectory + 'static
{
}

impl<T> Backend for T where
  T: PositionStore + IdentityDirectory + LinkDirectory + ProfileDirectory + 'static
{
}

/// Shared handler state.
pub struct ApiState<S, G> {
  pub store:    Arc<S>,
  pub geocoder: Arc<G>,
}

impl<S, G> Clone for ApiState<S, G> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      geocoder: Arc::clone(&self.geocoder),
    }
  }
}

/// Build a fully-materialised API router for `store` and `geocoder`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, G>(store: Arc<S>, geocoder: Arc<G>) -> Router<()>
where
  S: Backend,
  G: Geocoder + 'static,
{
  Router::new()
    // Positions
    .route("/positions", post(positions::ingest_one::<S, G>))
    .route("/positions/{subject_id}", get(positions::live::<S, G>))
    // Client home
    .route("/clients/{client_id}/home", get(clients::home::<S, G>))
    // Links
    .route("/links/{client_id}", get(links::get_one::<S, G>))
    .with_state(ApiState { store, geocoder })
}
