//! ETag computation for live position resources.
//!
//! Tracking clients poll the same resource every few seconds; a matching
//! `If-None-Match` lets the server answer `304` without a body.

use carelink_core::position::PositionRecord;
use sha2::{Digest, Sha256};

/// Compute a quoted ETag for `record`.
///
/// Covers every field a tracking client can observe, so any overwrite with
/// different content (or a later `updated_at`) produces a new tag.
pub fn compute_etag(record: &PositionRecord) -> String {
  let mut hasher = Sha256::new();
  hasher.update(record.subject_key.to_string().as_bytes());
  hasher.update([0]);
  hasher.update(format!("{:?}", record.role).as_bytes());
  hasher.update([0]);
  hasher.update(record.coordinates.lat.to_le_bytes());
  hasher.update(record.coordinates.lng.to_le_bytes());
  match record.accuracy {
    Some(acc) => {
      hasher.update([1]);
      hasher.update(acc.to_le_bytes());
    }
    None => hasher.update([0]),
  }
  hasher.update(record.updated_at.timestamp_micros().to_le_bytes());
  let hash = hasher.finalize();
  format!("\"{}\"", hex::encode(&hash[..16]))
}

fn strip_etag_quotes(s: &str) -> &str {
  let s = s.trim();
  let s = s.strip_prefix("W/").unwrap_or(s);
  s.trim_matches('"')
}

/// Whether an `If-None-Match` header value matches `etag`.
///
/// Accepts `*`, comma-separated lists, weak tags, and bare (unquoted) tags.
pub fn if_none_match_hits(header: &str, etag: &str) -> bool {
  let wanted = strip_etag_quotes(etag);
  header
    .split(',')
    .map(str::trim)
    .any(|candidate| candidate == "*" || strip_etag_quotes(candidate) == wanted)
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use carelink_core::{
    position::{Coordinates, PositionSource, Role},
    subject::{AccountId, SubjectKey},
  };

  use super::*;

  fn record(lat: f64, secs: i64) -> PositionRecord {
    PositionRecord {
      subject_key: SubjectKey::Account(AccountId::parse("cg-1").unwrap()),
      role:        Role::Caregiver,
      coordinates: Coordinates { lat, lng: -46.6 },
      accuracy:    Some(5.0),
      source:      PositionSource::DeviceReport,
      updated_at:  Utc.timestamp_opt(secs, 0).unwrap(),
    }
  }

  #[test]
  fn same_record_same_tag() {
    assert_eq!(compute_etag(&record(-23.5, 10)), compute_etag(&record(-23.5, 10)));
  }

  #[test]
  fn moving_or_refreshing_changes_tag() {
    let base = compute_etag(&record(-23.5, 10));
    assert_ne!(base, compute_etag(&record(-23.6, 10)));
    assert_ne!(base, compute_etag(&record(-23.5, 11)));
  }

  #[test]
  fn if_none_match_forms() {
    let tag = compute_etag(&record(-23.5, 10));
    let bare = tag.trim_matches('"').to_string();
    assert!(if_none_match_hits(&tag, &tag));
    assert!(if_none_match_hits(&bare, &tag));
    assert!(if_none_match_hits(&format!("W/{tag}"), &tag));
    assert!(if_none_match_hits(&format!("\"other\", {tag}"), &tag));
    assert!(if_none_match_hits("*", &tag));
    assert!(!if_none_match_hits("\"other\"", &tag));
  }
}
