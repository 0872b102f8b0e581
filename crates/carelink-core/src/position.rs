//! Position records: the latest known location of a subject in a role.
//!
//! There is at most one record per `(subject key, role)`. Writes overwrite in
//! place; no history is kept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, subject::SubjectKey};

// ─── Role ────────────────────────────────────────────────────────────────────

/// Which side of a client/caregiver link a record describes.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Client,
  #[default]
  Caregiver,
}

// ─── Coordinates ─────────────────────────────────────────────────────────────

/// A WGS84 latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub lat: f64,
  pub lng: f64,
}

impl Coordinates {
  /// Build a pair, rejecting non-finite or out-of-range values.
  pub fn new(lat: f64, lng: f64) -> Result<Self> {
    if !lat.is_finite() || !lng.is_finite() {
      return Err(Error::InvalidInput("coordinates must be finite".into()));
    }
    if !(-90.0..=90.0).contains(&lat) {
      return Err(Error::InvalidInput(format!("latitude {lat} out of range")));
    }
    if !(-180.0..=180.0).contains(&lng) {
      return Err(Error::InvalidInput(format!("longitude {lng} out of range")));
    }
    Ok(Self { lat, lng })
  }
}

// ─── Source ──────────────────────────────────────────────────────────────────

/// How a record's coordinates were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositionSource {
  /// Sent by the subject's own device.
  DeviceReport,
  /// Derived from the subject's postal code by the geocoding provider.
  GeocodedFallback,
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// A stored position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
  pub subject_key: SubjectKey,
  pub role:        Role,
  pub coordinates: Coordinates,
  /// Reported accuracy radius in meters.
  pub accuracy:    Option<f64>,
  pub source:      PositionSource,
  /// Store-assigned; never moves backwards for a given key.
  pub updated_at:  DateTime<Utc>,
}

/// Input to [`crate::store::PositionStore::upsert_position`].
/// `updated_at` is always set by the store; it is not accepted from callers.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPosition {
  pub subject_key: SubjectKey,
  pub role:        Role,
  pub coordinates: Coordinates,
  pub accuracy:    Option<f64>,
  pub source:      PositionSource,
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// A client's home position as served to the client's own view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeView {
  pub coordinates: Coordinates,
  pub source:      PositionSource,
  pub updated_at:  DateTime<Utc>,
}

impl From<&PositionRecord> for HomeView {
  fn from(r: &PositionRecord) -> Self {
    Self {
      coordinates: r.coordinates,
      source:      r.source,
      updated_at:  r.updated_at,
    }
  }
}

/// A subject's last known position as served to a tracking client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveView {
  pub coordinates: Coordinates,
  pub accuracy:    Option<f64>,
  pub updated_at:  DateTime<Utc>,
}

impl From<&PositionRecord> for LiveView {
  fn from(r: &PositionRecord) -> Self {
    Self {
      coordinates: r.coordinates,
      accuracy:    r.accuracy,
      updated_at:  r.updated_at,
    }
  }
}
