//! [`SqliteStore`]: the SQLite implementation of the Carelink store traits.

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use carelink_core::{
  position::{NewPosition, PositionRecord, Role},
  store::{IdentityDirectory, LinkDirectory, PositionStore, ProfileDirectory},
  subject::{AccountId, SessionId, SubjectKey},
};

use crate::{
  Result,
  encode::{RawPosition, encode_dt, encode_key, encode_role, encode_source},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Carelink store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, mainly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Collaborator mirrors ──────────────────────────────────────────────────
  //
  // The service never calls these; they exist so an operator (or a test) can
  // populate the tables the identity layer, link workflow and profile editor
  // own in production.

  /// Record that `session` belongs to `account`.
  pub async fn bind_session(&self, session: &SessionId, account: &AccountId) -> Result<()> {
    let session = session.as_str().to_owned();
    let account = account.as_str().to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO identities (session_id, account_id) VALUES (?1, ?2)
           ON CONFLICT(session_id) DO UPDATE SET account_id = excluded.account_id",
          rusqlite::params![session, account],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Link `client` to `caregiver`, replacing any previous link.
  pub async fn set_link(&self, client: &AccountId, caregiver: &AccountId) -> Result<()> {
    let client = client.as_str().to_owned();
    let caregiver = caregiver.as_str().to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO links (client_id, caregiver_id) VALUES (?1, ?2)
           ON CONFLICT(client_id) DO UPDATE SET caregiver_id = excluded.caregiver_id",
          rusqlite::params![client, caregiver],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Set (or clear) the postal code on `account`'s profile.
  pub async fn set_postal_code(
    &self,
    account: &AccountId,
    postal_code: Option<&str>,
  ) -> Result<()> {
    let account = account.as_str().to_owned();
    let postal_code = postal_code.map(str::to_owned);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO profiles (account_id, postal_code) VALUES (?1, ?2)
           ON CONFLICT(account_id) DO UPDATE SET postal_code = excluded.postal_code",
          rusqlite::params![account, postal_code],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Number of stored position rows.
  pub async fn position_count(&self) -> Result<usize> {
    let n: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM positions", [], |r| r.get(0))?)
      })
      .await?;
    Ok(usize::try_from(n).unwrap_or_default())
  }
}

// ─── PositionStore impl ──────────────────────────────────────────────────────

impl PositionStore for SqliteStore {
  type Error = crate::Error;

  async fn upsert_position(&self, input: NewPosition) -> Result<PositionRecord> {
    let key_str    = encode_key(&input.subject_key);
    let role_str   = encode_role(input.role).to_owned();
    let source_str = encode_source(input.source).to_owned();
    let at_str     = encode_dt(Utc::now());
    let lat        = input.coordinates.lat;
    let lng        = input.coordinates.lng;
    let accuracy   = input.accuracy;

    let raw: RawPosition = self
      .conn
      .call(move |conn| {
        // One statement, so the insert-or-overwrite is atomic. `updated_at`
        // keeps the later of the old and new values.
        let sql = format!(
          "INSERT INTO positions (
             subject_key, role, latitude, longitude, accuracy, source, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT(subject_key, role) DO UPDATE SET
             latitude   = excluded.latitude,
             longitude  = excluded.longitude,
             accuracy   = excluded.accuracy,
             source     = excluded.source,
             updated_at = MAX(positions.updated_at, excluded.updated_at)
           RETURNING {}",
          RawPosition::COLUMNS
        );
        Ok(conn.query_row(
          &sql,
          rusqlite::params![key_str, role_str, lat, lng, accuracy, source_str, at_str],
          RawPosition::from_row,
        )?)
      })
      .await?;

    raw.into_record()
  }

  async fn get_position<'a>(
    &'a self,
    key: &'a SubjectKey,
    role: Role,
  ) -> Result<Option<PositionRecord>> {
    let key_str  = encode_key(key);
    let role_str = encode_role(role).to_owned();

    let raw: Option<RawPosition> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM positions WHERE subject_key = ?1 AND role = ?2",
          RawPosition::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![key_str, role_str], RawPosition::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPosition::into_record).transpose()
  }
}

// ─── Directory impls ─────────────────────────────────────────────────────────

impl IdentityDirectory for SqliteStore {
  type Error = crate::Error;

  async fn account_for_session<'a>(
    &'a self,
    session: &'a SessionId,
  ) -> Result<Option<AccountId>> {
    let session_str = session.as_str().to_owned();

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT account_id FROM identities WHERE session_id = ?1",
              rusqlite::params![session_str],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(raw.map(|s| AccountId::parse(&s)).transpose()?)
  }

  async fn sessions_for_account<'a>(
    &'a self,
    account: &'a AccountId,
  ) -> Result<Vec<SessionId>> {
    let account_str = account.as_str().to_owned();

    let raws: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare("SELECT session_id FROM identities WHERE account_id = ?1")?;
        let rows = stmt
          .query_map(rusqlite::params![account_str], |r| r.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      raws
        .iter()
        .map(|s| SessionId::parse(s))
        .collect::<carelink_core::Result<_>>()?,
    )
  }
}

impl LinkDirectory for SqliteStore {
  type Error = crate::Error;

  async fn linked_caregiver<'a>(
    &'a self,
    client: &'a AccountId,
  ) -> Result<Option<AccountId>> {
    let client_str = client.as_str().to_owned();

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT caregiver_id FROM links WHERE client_id = ?1",
              rusqlite::params![client_str],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(raw.map(|s| AccountId::parse(&s)).transpose()?)
  }
}

impl ProfileDirectory for SqliteStore {
  type Error = crate::Error;

  async fn postal_code<'a>(&'a self, account: &'a AccountId) -> Result<Option<String>> {
    let account_str = account.as_str().to_owned();

    let raw: Option<Option<String>> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT postal_code FROM profiles WHERE account_id = ?1",
              rusqlite::params![account_str],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(raw.flatten())
  }
}
