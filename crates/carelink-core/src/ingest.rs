//! Position ingestion: validate a device report and upsert it.

use tracing::{debug, info};

use crate::{
  Error, Result,
  position::{Coordinates, NewPosition, PositionRecord, PositionSource, Role},
  store::{IdentityDirectory, PositionStore},
  subject::{SubjectKey, SubjectRef},
};

/// A position report as received from a device, before validation.
#[derive(Debug, Clone)]
pub struct PositionReport {
  pub subject:  SubjectRef,
  pub role:     Role,
  pub lat:      Option<f64>,
  pub lng:      Option<f64>,
  /// Accuracy radius in meters.
  pub accuracy: Option<f64>,
}

/// Resolve a [`SubjectRef`] to the key its records live under.
///
/// An account id always wins. A bare session id is mapped to its account
/// when the identity layer knows one, and used as-is otherwise.
pub async fn normalize<D>(directory: &D, subject: &SubjectRef) -> Result<SubjectKey>
where
  D: IdentityDirectory,
{
  if let Some(account) = subject.account_id() {
    return Ok(SubjectKey::Account(account.clone()));
  }

  let session = subject.session_id().ok_or_else(|| {
    Error::InvalidInput("either an account id or a session id is required".into())
  })?;

  match directory
    .account_for_session(session)
    .await
    .map_err(Error::store)?
  {
    Some(account) => {
      debug!(%session, %account, "session resolved to account");
      Ok(SubjectKey::Account(account))
    }
    None => Ok(SubjectKey::Session(session.clone())),
  }
}

fn validate(report: &PositionReport) -> Result<(Coordinates, Option<f64>)> {
  let (Some(lat), Some(lng)) = (report.lat, report.lng) else {
    return Err(Error::InvalidInput("both lat and lng are required".into()));
  };
  let coordinates = Coordinates::new(lat, lng)?;

  if let Some(acc) = report.accuracy
    && !(acc.is_finite() && acc >= 0.0)
  {
    return Err(Error::InvalidInput(format!("accuracy {acc} is not a valid radius")));
  }

  Ok((coordinates, report.accuracy))
}

/// Validate `report` and upsert it as a device report.
///
/// Retrying with the same subject and role overwrites the earlier record; it
/// never creates a second one.
pub async fn ingest<S, D>(
  store: &S,
  directory: &D,
  report: PositionReport,
) -> Result<PositionRecord>
where
  S: PositionStore,
  D: IdentityDirectory,
{
  let (coordinates, accuracy) = validate(&report)?;
  let subject_key = normalize(directory, &report.subject).await?;

  let record = store
    .upsert_position(NewPosition {
      subject_key,
      role: report.role,
      coordinates,
      accuracy,
      source: PositionSource::DeviceReport,
    })
    .await
    .map_err(Error::store)?;

  info!(
    subject = %record.subject_key,
    role = ?record.role,
    "position ingested"
  );
  Ok(record)
}
