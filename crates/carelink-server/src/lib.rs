//! HTTP server assembly for Carelink.
//!
//! Mounts the JSON API from `carelink-api` under `/api`, adds a health
//! probe, and wraps everything in request tracing. The binary in `main.rs`
//! handles configuration and process setup.

use std::{path::PathBuf, sync::Arc};

use axum::{Router, routing::get};
use carelink_api::{Backend, api_router};
use carelink_core::geocode::Geocoder;
use carelink_geocode::GeocoderConfig;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/carelink/carelink.db") }

/// Runtime server configuration, deserialised from `config.toml` and
/// `CARELINK__*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  pub geocoder:   GeocoderConfig,
}

// ─── Router ───────────────────────────────────────────────────────────────────

async fn health() -> &'static str { "ok" }

/// Build the full application router.
pub fn router<S, G>(store: Arc<S>, geocoder: Arc<G>) -> Router
where
  S: Backend,
  G: Geocoder + 'static,
{
  Router::new()
    .route("/health", get(health))
    .nest("/api", api_router(store, geocoder))
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────
