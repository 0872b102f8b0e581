//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed microsecond width so
//! that lexical order matches chronological order. Subject keys carry their
//! namespace as a prefix.

use chrono::{DateTime, SecondsFormat, Utc};
use carelink_core::{
  position::{Coordinates, PositionRecord, PositionSource, Role},
  subject::{AccountId, SessionId, SubjectKey},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── SubjectKey ──────────────────────────────────────────────────────────────

pub fn encode_key(key: &SubjectKey) -> String { key.to_string() }

pub fn decode_key(s: &str) -> Result<SubjectKey> {
  let corrupt = || Error::Corrupt { column: "subject_key", value: s.to_owned() };
  match s.split_once(':') {
    Some(("account", id)) => Ok(SubjectKey::Account(AccountId::parse(id)?)),
    Some(("session", id)) => Ok(SubjectKey::Session(SessionId::parse(id)?)),
    _ => Err(corrupt()),
  }
}

// ─── Role ────────────────────────────────────────────────────────────────────

pub fn encode_role(r: Role) -> &'static str {
  match r {
    Role::Client => "client",
    Role::Caregiver => "caregiver",
  }
}

pub fn decode_role(s: &str) -> Result<Role> {
  match s {
    "client" => Ok(Role::Client),
    "caregiver" => Ok(Role::Caregiver),
    other => Err(Error::Corrupt { column: "role", value: other.to_owned() }),
  }
}

// ─── PositionSource ──────────────────────────────────────────────────────────

pub fn encode_source(s: PositionSource) -> &'static str {
  match s {
    PositionSource::DeviceReport => "device-report",
    PositionSource::GeocodedFallback => "geocoded-fallback",
  }
}

pub fn decode_source(s: &str) -> Result<PositionSource> {
  match s {
    "device-report" => Ok(PositionSource::DeviceReport),
    "geocoded-fallback" => Ok(PositionSource::GeocodedFallback),
    other => Err(Error::Corrupt { column: "source", value: other.to_owned() }),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `positions` row.
pub struct RawPosition {
  pub subject_key: String,
  pub role:        String,
  pub latitude:    f64,
  pub longitude:   f64,
  pub accuracy:    Option<f64>,
  pub source:      String,
  pub updated_at:  String,
}

impl RawPosition {
  /// Column order expected by [`RawPosition::from_row`].
  pub const COLUMNS: &'static str =
    "subject_key, role, latitude, longitude, accuracy, source, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_key: row.get(0)?,
      role:        row.get(1)?,
      latitude:    row.get(2)?,
      longitude:   row.get(3)?,
      accuracy:    row.get(4)?,
      source:      row.get(5)?,
      updated_at:  row.get(6)?,
    })
  }

  pub fn into_record(self) -> Result<PositionRecord> {
    Ok(PositionRecord {
      subject_key: decode_key(&self.subject_key)?,
      role:        decode_role(&self.role)?,
      coordinates: Coordinates::new(self.latitude, self.longitude)?,
      accuracy:    self.accuracy,
      source:      decode_source(&self.source)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}
