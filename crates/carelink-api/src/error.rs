//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Seconds a client should wait before retrying after a 503.
const RETRY_AFTER_SECS: &str = "5";

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("store unavailable: {0}")]
  Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<carelink_core::Error> for ApiError {
  fn from(e: carelink_core::Error) -> Self {
    use carelink_core::Error as E;
    match e {
      E::InvalidInput(m) => ApiError::InvalidInput(m),
      E::NoLocationAvailable(m) => ApiError::NotFound(m),
      E::StoreUnavailable(source) => ApiError::Unavailable(source),
      E::DataCorrupt(source) => ApiError::Internal(source),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match self {
      ApiError::InvalidInput(m) => {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": m }))).into_response()
      }
      ApiError::NotFound(m) => {
        (StatusCode::NOT_FOUND, Json(json!({ "error": m }))).into_response()
      }
      ApiError::Unavailable(e) => {
        tracing::warn!(error = %e, "store unavailable");
        let mut res = (
          StatusCode::SERVICE_UNAVAILABLE,
          Json(json!({ "error": e.to_string(), "retryable": true })),
        )
          .into_response();
        res.headers_mut().insert(
          header::RETRY_AFTER,
          HeaderValue::from_static(RETRY_AFTER_SECS),
        );
        res
      }
      ApiError::Internal(e) => {
        tracing::error!(error = %e, "unreadable stored data");
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          Json(json!({ "error": e.to_string(), "retryable": false })),
        )
          .into_response()
      }
    }
  }
}
