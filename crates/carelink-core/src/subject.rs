//! Subject identity: the two identifier namespaces a reporter can use.
//!
//! A subject is known by a durable account id, an auth-session id, or both.
//! Session ids rotate, so storage prefers the account id whenever one can be
//! obtained; see [`crate::ingest::normalize`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Longest identifier accepted in either namespace.
pub const MAX_ID_LEN: usize = 128;

fn validate(kind: &str, raw: &str) -> Result<String> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(Error::InvalidInput(format!("{kind} is empty")));
  }
  if trimmed.len() > MAX_ID_LEN {
    return Err(Error::InvalidInput(format!(
      "{kind} exceeds {MAX_ID_LEN} bytes"
    )));
  }
  if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
    return Err(Error::InvalidInput(format!(
      "{kind} contains whitespace or control characters"
    )));
  }
  Ok(trimmed.to_owned())
}

// ─── Identifiers ─────────────────────────────────────────────────────────────

/// A durable account identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
  pub fn parse(raw: &str) -> Result<Self> {
    validate("account id", raw).map(Self)
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for AccountId {
  type Error = Error;

  fn try_from(raw: String) -> Result<Self> { Self::parse(&raw) }
}

impl From<AccountId> for String {
  fn from(id: AccountId) -> Self { id.0 }
}

impl fmt::Display for AccountId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// An auth-session identifier. May rotate; never preferred over an
/// [`AccountId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
  pub fn parse(raw: &str) -> Result<Self> {
    validate("session id", raw).map(Self)
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for SessionId {
  type Error = Error;

  fn try_from(raw: String) -> Result<Self> { Self::parse(&raw) }
}

impl From<SessionId> for String {
  fn from(id: SessionId) -> Self { id.0 }
}

impl fmt::Display for SessionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── SubjectRef ──────────────────────────────────────────────────────────────

/// The identity a caller presents: a primary account id and/or a session
/// alias. Passed explicitly into every operation; there is no ambient
/// "current session".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRef {
  account: Option<AccountId>,
  session: Option<SessionId>,
}

impl SubjectRef {
  /// Build a reference from whichever ids are available. At least one is
  /// required.
  pub fn new(
    account: Option<AccountId>,
    session: Option<SessionId>,
  ) -> Result<Self> {
    if account.is_none() && session.is_none() {
      return Err(Error::InvalidInput(
        "either an account id or a session id is required".into(),
      ));
    }
    Ok(Self { account, session })
  }

  pub fn account(id: AccountId) -> Self {
    Self { account: Some(id), session: None }
  }

  pub fn session(id: SessionId) -> Self {
    Self { account: None, session: Some(id) }
  }

  pub fn account_id(&self) -> Option<&AccountId> { self.account.as_ref() }

  pub fn session_id(&self) -> Option<&SessionId> { self.session.as_ref() }
}

// ─── SubjectKey ──────────────────────────────────────────────────────────────

/// The single key a position record is stored under once a [`SubjectRef`]
/// has been normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum SubjectKey {
  Account(AccountId),
  Session(SessionId),
}

impl SubjectKey {
  pub fn as_account(&self) -> Option<&AccountId> {
    match self {
      Self::Account(id) => Some(id),
      Self::Session(_) => None,
    }
  }
}

impl fmt::Display for SubjectKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Account(id) => write!(f, "account:{id}"),
      Self::Session(id) => write!(f, "session:{id}"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ids_are_trimmed() {
    let id = AccountId::parse("  acct-1 ").unwrap();
    assert_eq!(id.as_str(), "acct-1");
  }

  #[test]
  fn empty_and_spaced_ids_are_rejected() {
    assert!(matches!(AccountId::parse("   "), Err(Error::InvalidInput(_))));
    assert!(matches!(SessionId::parse("a b"), Err(Error::InvalidInput(_))));
    assert!(matches!(
      SessionId::parse(&"x".repeat(MAX_ID_LEN + 1)),
      Err(Error::InvalidInput(_))
    ));
  }

  #[test]
  fn subject_ref_requires_an_id() {
    assert!(SubjectRef::new(None, None).is_err());
    let sess = SessionId::parse("s1").unwrap();
    let r = SubjectRef::new(None, Some(sess.clone())).unwrap();
    assert_eq!(r.session_id(), Some(&sess));
    assert!(r.account_id().is_none());
  }

  #[test]
  fn account_id_deserialisation_validates() {
    let ok: AccountId = serde_json::from_str("\"acct-7\"").unwrap();
    assert_eq!(ok.as_str(), "acct-7");
    assert!(serde_json::from_str::<AccountId>("\"\"").is_err());
  }

  #[test]
  fn key_display_is_namespaced() {
    let key = SubjectKey::Session(SessionId::parse("abc").unwrap());
    assert_eq!(key.to_string(), "session:abc");
  }
}
