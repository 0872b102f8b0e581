//! Read paths: live position lookup and link resolution.

use tracing::debug;

use crate::{
  Error, Result,
  ingest::normalize,
  position::{PositionRecord, Role},
  store::{IdentityDirectory, LinkDirectory, PositionStore},
  subject::{AccountId, SessionId, SubjectKey, SubjectRef},
};

/// Find the latest record for `subject` in `role`.
///
/// The subject is normalized exactly as on the write path. When that key is
/// an account, records written under any of the account's known session ids
/// are read as well; the most recently updated record wins.
pub async fn locate<S, D>(
  store: &S,
  directory: &D,
  subject: &SubjectRef,
  role: Role,
) -> Result<Option<PositionRecord>>
where
  S: PositionStore,
  D: IdentityDirectory,
{
  let key = normalize(directory, subject).await?;
  let direct = store.get_position(&key, role).await.map_err(Error::store)?;

  let Some(account) = key.as_account() else {
    return Ok(direct);
  };

  let sessions = directory
    .sessions_for_account(account)
    .await
    .map_err(Error::store)?;

  let mut latest = direct;
  for session in sessions {
    let alias = SubjectKey::Session(session);
    if let Some(record) = store.get_position(&alias, role).await.map_err(Error::store)?
      && latest.as_ref().is_none_or(|l| record.updated_at > l.updated_at)
    {
      debug!(%account, session = %alias, "newer position found under a session alias");
      latest = Some(record);
    }
  }

  Ok(latest)
}

/// Like [`locate`], for an id whose namespace the caller does not know.
///
/// The id is tried as an account id first, then as a session id.
pub async fn locate_by_raw_id<S, D>(
  store: &S,
  directory: &D,
  raw: &str,
  role: Role,
) -> Result<Option<PositionRecord>>
where
  S: PositionStore,
  D: IdentityDirectory,
{
  let account = AccountId::parse(raw)?;
  if let Some(record) =
    locate(store, directory, &SubjectRef::account(account), role).await?
  {
    return Ok(Some(record));
  }

  let session = SessionId::parse(raw)?;
  locate(store, directory, &SubjectRef::session(session), role).await
}

/// The caregiver linked to `client`, if any.
pub async fn linked_caregiver<L>(links: &L, client: &AccountId) -> Result<Option<AccountId>>
where
  L: LinkDirectory,
{
  links.linked_caregiver(client).await.map_err(Error::store)
}
