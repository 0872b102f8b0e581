//! The read side a tracking session polls.

use std::{future::Future, time::Duration};

use carelink_core::{position::LiveView, subject::AccountId};
use thiserror::Error;

/// A failed read. Every variant counts toward a session's backoff; expected
/// absence is `Ok(None)` instead.
#[derive(Debug, Error)]
pub enum FeedError {
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("server answered {0}")]
  Status(reqwest::StatusCode),

  #[error("no answer within {0:?}")]
  Timeout(Duration),

  #[error("304 Not Modified without a cached position")]
  StaleCache,
}

/// Source of link and position data for a tracking session.
pub trait PositionFeed: Send + Sync {
  /// The caregiver currently linked to `client`, if any.
  fn linked_caregiver<'a>(
    &'a self,
    client: &'a AccountId,
  ) -> impl Future<Output = Result<Option<AccountId>, FeedError>> + Send + 'a;

  /// The caregiver's last reported position; `None` before the first report.
  fn caregiver_position<'a>(
    &'a self,
    caregiver: &'a AccountId,
  ) -> impl Future<Output = Result<Option<LiveView>, FeedError>> + Send + 'a;
}
