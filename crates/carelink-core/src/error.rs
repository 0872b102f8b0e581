//! Error types for `carelink-core`.

use thiserror::Error;

use crate::store::BackendError;

#[derive(Debug, Error)]
pub enum Error {
  /// The caller sent something unusable. Retrying the same input fails again.
  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// No stored position exists and none could be derived right now.
  #[error("no location available: {0}")]
  NoLocationAvailable(String),

  /// A backing store or directory could not be reached. Safe to retry.
  #[error("store unavailable: {0}")]
  StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The store answered with data that cannot be decoded. Retrying reads
  /// the same bytes again.
  #[error("stored data is corrupt: {0}")]
  DataCorrupt(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error as [`Error::StoreUnavailable`], or as
  /// [`Error::DataCorrupt`] when the backend reports a permanent fault.
  pub fn store<E: BackendError>(e: E) -> Self {
    if e.is_transient() {
      Self::StoreUnavailable(Box::new(e))
    } else {
      Self::DataCorrupt(Box::new(e))
    }
  }

  /// Whether the same request may succeed if repeated later.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::StoreUnavailable(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
