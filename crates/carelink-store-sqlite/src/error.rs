//! Error type for `carelink-store-sqlite`.

use carelink_core::store::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] carelink_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A column held a value no domain type maps to.
  #[error("corrupt {column} column: {value:?}")]
  Corrupt { column: &'static str, value: String },
}

impl BackendError for Error {
  /// Only database access failures can clear up on their own; a row that
  /// does not decode stays undecodable.
  fn is_transient(&self) -> bool { matches!(self, Error::Database(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
