//! Collaborator traits: the position store and the read-only directories.
//!
//! The traits are implemented by storage backends (e.g.
//! `carelink-store-sqlite`). Services in this crate and the HTTP layer depend
//! on these abstractions, not on any concrete backend.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use crate::{
  position::{NewPosition, PositionRecord, Role},
  subject::{AccountId, SessionId, SubjectKey},
};

// ─── Backend errors ──────────────────────────────────────────────────────────

/// An error raised by a store or directory backend.
pub trait BackendError: std::error::Error + Send + Sync + 'static {
  /// Whether the same call may succeed later. Defaults to `true`; decode
  /// failures on stored rows should answer `false`.
  fn is_transient(&self) -> bool { true }
}

impl BackendError for std::io::Error {}

// ─── Positions ───────────────────────────────────────────────────────────────

/// Keyed store holding the latest position per `(subject key, role)`.
pub trait PositionStore: Send + Sync {
  type Error: BackendError;

  /// Insert or overwrite the record for `(input.subject_key, input.role)`
  /// atomically, and return what was stored. The store assigns
  /// `updated_at`.
  fn upsert_position(
    &self,
    input: NewPosition,
  ) -> impl Future<Output = Result<PositionRecord, Self::Error>> + Send + '_;

  /// Read the record for `(key, role)`. Returns `None` if nothing was ever
  /// written.
  fn get_position<'a>(
    &'a self,
    key: &'a SubjectKey,
    role: Role,
  ) -> impl Future<Output = Result<Option<PositionRecord>, Self::Error>> + Send + 'a;
}

// ─── External collaborators (read-only) ──────────────────────────────────────

/// The identity layer's mapping between session ids and accounts.
pub trait IdentityDirectory: Send + Sync {
  type Error: BackendError;

  /// The account a session belongs to, if the identity layer knows it.
  fn account_for_session<'a>(
    &'a self,
    session: &'a SessionId,
  ) -> impl Future<Output = Result<Option<AccountId>, Self::Error>> + Send + 'a;

  /// Every session id known to belong to `account`.
  fn sessions_for_account<'a>(
    &'a self,
    account: &'a AccountId,
  ) -> impl Future<Output = Result<Vec<SessionId>, Self::Error>> + Send + 'a;
}

/// Pre-existing client → caregiver links.
pub trait LinkDirectory: Send + Sync {
  type Error: BackendError;

  fn linked_caregiver<'a>(
    &'a self,
    client: &'a AccountId,
  ) -> impl Future<Output = Result<Option<AccountId>, Self::Error>> + Send + 'a;
}

/// Client profiles, consulted only for the postal code.
pub trait ProfileDirectory: Send + Sync {
  type Error: BackendError;

  fn postal_code<'a>(
    &'a self,
    account: &'a AccountId,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'a;
}
