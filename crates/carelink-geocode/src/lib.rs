//! HTTP geocoding adapter for Carelink.
//!
//! Resolves postal codes through a Nominatim-compatible search endpoint
//! (`/search?postalcode=...&format=json`). Every failure mode is folded into
//! "not found" at the [`Geocoder`] boundary; the detailed [`Error`] only
//! reaches the logs.

use std::time::Duration;

use carelink_core::{geocode::Geocoder, position::Coordinates};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_user_agent() -> String {
  concat!("carelink/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_timeout_secs() -> u64 { 10 }

/// Provider settings, deserialised from the `[geocoder]` config table.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocoderConfig {
  /// Full URL of the search endpoint.
  pub endpoint:     String,
  /// ISO 3166-1 alpha-2 code restricting the search, e.g. `"br"`.
  #[serde(default)]
  pub country_code: Option<String>,
  /// Sent as the `key` query parameter when set.
  #[serde(default)]
  pub api_key:      Option<String>,
  #[serde(default = "default_user_agent")]
  pub user_agent:   String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

// ─── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("provider returned status {0}")]
  Status(reqwest::StatusCode),

  #[error("no usable coordinates in provider response")]
  NoUsableHit,
}

// ─── Response shape ───────────────────────────────────────────────────────────

/// One search hit. Nominatim encodes coordinates as decimal strings.
#[derive(Debug, Deserialize)]
struct Hit {
  lat: String,
  lon: String,
}

/// First hit whose coordinates parse and fall in range.
fn first_usable(hits: &[Hit]) -> Option<Coordinates> {
  hits.iter().find_map(|h| {
    let lat = h.lat.trim().parse().ok()?;
    let lng = h.lon.trim().parse().ok()?;
    Coordinates::new(lat, lng).ok()
  })
}

// ─── Adapter ──────────────────────────────────────────────────────────────────

/// Geocoder backed by an HTTP search endpoint.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpGeocoder {
  client: Client,
  config: GeocoderConfig,
}

impl HttpGeocoder {
  pub fn new(config: GeocoderConfig) -> Result<Self, Error> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(config.user_agent.clone())
      .build()?;
    Ok(Self { client, config })
  }

  /// Query the provider. `Ok(None)` means the provider answered with no hits.
  pub async fn lookup(&self, postal_code: &str) -> Result<Option<Coordinates>, Error> {
    let mut query: Vec<(&str, &str)> = vec![
      ("postalcode", postal_code),
      ("format", "json"),
      ("limit", "1"),
    ];
    if let Some(cc) = &self.config.country_code {
      query.push(("countrycodes", cc.as_str()));
    }
    if let Some(key) = &self.config.api_key {
      query.push(("key", key.as_str()));
    }

    let resp = self
      .client
      .get(&self.config.endpoint)
      .query(&query)
      .send()
      .await?;

    if !resp.status().is_success() {
      return Err(Error::Status(resp.status()));
    }

    let hits: Vec<Hit> = resp.json().await?;
    if hits.is_empty() {
      return Ok(None);
    }
    first_usable(&hits).map(Some).ok_or(Error::NoUsableHit)
  }
}

impl Geocoder for HttpGeocoder {
  async fn resolve<'a>(&'a self, postal_code: &'a str) -> Option<Coordinates> {
    let code = postal_code.trim();
    if code.is_empty() {
      return None;
    }

    match self.lookup(code).await {
      Ok(Some(coords)) => Some(coords),
      Ok(None) => {
        debug!(postal_code = code, "geocoder returned no results");
        None
      }
      Err(e) => {
        warn!(postal_code = code, error = %e, "geocoding failed");
        None
      }
    }
  }
}
