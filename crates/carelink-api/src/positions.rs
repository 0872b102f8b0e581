//! Handlers for `/positions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/positions` | Body: [`ReportBody`]; returns 200 + stored record |
//! | `GET`  | `/positions/:subject_id` | Account or session id; optional `?role=`; honours `If-None-Match` |

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{JsonRejection, QueryRejection},
  },
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use carelink_core::{
  geocode::Geocoder,
  ingest::{PositionReport, ingest},
  locate::locate_by_raw_id,
  position::{LiveView, PositionRecord, Role},
  subject::{AccountId, SessionId, SubjectRef},
};
use serde::Deserialize;

use crate::{
  ApiState, Backend,
  error::ApiError,
  etag::{compute_etag, if_none_match_hits},
};

// ─── Ingest ───────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /positions`.
///
/// `subject_id` is the durable account id and wins when both ids are sent.
#[derive(Debug, Deserialize)]
pub struct ReportBody {
  pub subject_id: Option<String>,
  pub session_id: Option<String>,
  #[serde(default)]
  pub role:       Role,
  pub lat:        Option<f64>,
  pub lng:        Option<f64>,
  pub accuracy:   Option<f64>,
}

impl TryFrom<ReportBody> for PositionReport {
  type Error = carelink_core::Error;

  fn try_from(b: ReportBody) -> carelink_core::Result<Self> {
    let account = b.subject_id.as_deref().map(AccountId::parse).transpose()?;
    let session = b.session_id.as_deref().map(SessionId::parse).transpose()?;
    Ok(PositionReport {
      subject:  SubjectRef::new(account, session)?,
      role:     b.role,
      lat:      b.lat,
      lng:      b.lng,
      accuracy: b.accuracy,
    })
  }
}

/// `POST /positions`: returns the stored [`PositionRecord`].
///
/// Malformed JSON is a 400, not axum's default 422.
pub async fn ingest_one<S, G>(
  State(state): State<ApiState<S, G>>,
  body: Result<Json<ReportBody>, JsonRejection>,
) -> Result<Json<PositionRecord>, ApiError>
where
  S: Backend,
  G: Geocoder + 'static,
{
  let Json(body) = body.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
  let report = PositionReport::try_from(body)?;
  let record = ingest(state.store.as_ref(), state.store.as_ref(), report).await?;
  Ok(Json(record))
}

// ─── Live lookup ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LiveParams {
  #[serde(default)]
  pub role: Role,
}

/// `GET /positions/:subject_id[?role=caregiver|client]`
pub async fn live<S, G>(
  State(state): State<ApiState<S, G>>,
  Path(subject_id): Path<String>,
  params: Result<Query<LiveParams>, QueryRejection>,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: Backend,
  G: Geocoder + 'static,
{
  let Query(params) = params.map_err(|e| ApiError::InvalidInput(e.body_text()))?;
  let record = locate_by_raw_id(
    state.store.as_ref(),
    state.store.as_ref(),
    &subject_id,
    params.role,
  )
  .await?
  .ok_or_else(|| ApiError::NotFound(format!("no position reported for {subject_id}")))?;

  let etag = compute_etag(&record);
  let fresh = headers
    .get(header::IF_NONE_MATCH)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|inm| if_none_match_hits(inm, &etag));

  if fresh {
    return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
  }

  Ok(([(header::ETAG, etag)], Json(LiveView::from(&record))).into_response())
}
