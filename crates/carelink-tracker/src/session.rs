//! Per-view tracking session.
//!
//! One session is one tokio task:
//!
//! ```text
//! Idle ──start──▶ Resolving ──link──▶ Polling ──cancel / view closed / too many failures──▶ Stopped
//!                     │
//!                     └──no link──▶ Stopped(NoLink)
//! ```
//!
//! Within a session reads are strictly sequential. Each read is raced
//! against the session's [`CancellationToken`] and bounded by
//! [`TrackerConfig::read_timeout`]; cancelling drops the in-flight read.

use std::{future::Future, sync::Arc, time::Duration};

use carelink_core::{
  position::{Coordinates, LiveView},
  subject::AccountId,
};
use tokio::{
  sync::{mpsc, watch},
  task::{JoinError, JoinHandle},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::feed::{FeedError, PositionFeed};

const UPDATE_BUFFER: usize = 16;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Timing policy for a session.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
  /// Delay between healthy ticks.
  pub interval:                 Duration,
  /// Upper bound on a single feed read.
  pub read_timeout:             Duration,
  /// Ceiling for the failure backoff.
  pub backoff_cap:              Duration,
  /// Consecutive failures before [`ProximityUpdate::Degraded`] is emitted.
  pub surface_failures_after:   u32,
  /// Consecutive failures that end the session.
  pub max_consecutive_failures: u32,
}

impl Default for TrackerConfig {
  fn default() -> Self {
    Self {
      interval:                 Duration::from_secs(3),
      read_timeout:             Duration::from_secs(5),
      backoff_cap:              Duration::from_secs(30),
      surface_failures_after:   2,
      max_consecutive_failures: 10,
    }
  }
}

impl TrackerConfig {
  /// `min(interval * 2^failures, backoff_cap)`; `interval` when healthy.
  pub fn retry_delay(&self, failures: u32) -> Duration {
    let factor = 1u32.checked_shl(failures).unwrap_or(u32::MAX);
    self.interval.saturating_mul(factor).min(self.backoff_cap)
  }
}

// ─── State ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
  /// The client has no linked caregiver.
  NoLink,
  /// [`SessionHandle::cancel`] was called.
  Cancelled,
  /// The update receiver was dropped.
  ViewClosed,
  /// `max_consecutive_failures` reads failed in a row.
  TooManyFailures,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
  Idle,
  Resolving,
  Polling { caregiver: AccountId },
  Stopped(StopReason),
}

/// Published on the session's watch channel after every transition and tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
  pub state:                SessionState,
  pub consecutive_failures: u32,
}

/// What the view should render after a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ProximityUpdate {
  Located {
    caregiver:   AccountId,
    fix:         LiveView,
    /// `None` when the client's home is unknown.
    distance_km: Option<f64>,
  },
  /// The caregiver has never reported a position.
  NoDataYet { caregiver: AccountId },
  /// Reads keep failing; polling continues after `retry_in`.
  Degraded {
    consecutive_failures: u32,
    retry_in:             Duration,
  },
}

// ─── Handle ───────────────────────────────────────────────────────────────────

/// Owner-side handle of a running session.
pub struct SessionHandle {
  cancel:   CancellationToken,
  snapshot: watch::Receiver<SessionSnapshot>,
  task:     JoinHandle<StopReason>,
}

impl SessionHandle {
  /// Request teardown. Returns immediately; [`join`](Self::join) to wait.
  pub fn cancel(&self) { self.cancel.cancel(); }

  pub fn snapshot(&self) -> watch::Receiver<SessionSnapshot> { self.snapshot.clone() }

  /// Wait for the session task to finish.
  pub async fn join(self) -> Result<StopReason, JoinError> { self.task.await }
}

/// Start a session for `client`. Updates arrive on the returned receiver;
/// dropping it ends the session with [`StopReason::ViewClosed`].
pub fn spawn<F>(
  feed: Arc<F>,
  client: AccountId,
  home: Option<Coordinates>,
  config: TrackerConfig,
) -> (SessionHandle, mpsc::Receiver<ProximityUpdate>)
where
  F: PositionFeed + 'static,
{
  let cancel = CancellationToken::new();
  let (update_tx, update_rx) = mpsc::channel(UPDATE_BUFFER);
  let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot {
    state:                SessionState::Idle,
    consecutive_failures: 0,
  });

  let session = Session {
    feed,
    client,
    home,
    config,
    cancel: cancel.clone(),
    updates: update_tx,
    snapshot: snapshot_tx,
    failures: 0,
  };
  let task = tokio::spawn(session.run());

  let handle = SessionHandle { cancel, snapshot: snapshot_rx, task };
  (handle, update_rx)
}

// ─── Session task ─────────────────────────────────────────────────────────────

struct Session<F> {
  feed:     Arc<F>,
  client:   AccountId,
  home:     Option<Coordinates>,
  config:   TrackerConfig,
  cancel:   CancellationToken,
  updates:  mpsc::Sender<ProximityUpdate>,
  snapshot: watch::Sender<SessionSnapshot>,
  failures: u32,
}

impl<F: PositionFeed> Session<F> {
  async fn run(mut self) -> StopReason {
    let reason = match self.resolve().await {
      Ok(caregiver) => self.poll(caregiver).await,
      Err(reason) => reason,
    };
    self.set_state(SessionState::Stopped(reason));
    info!(client = %self.client, ?reason, "tracking session stopped");
    reason
  }

  async fn resolve(&mut self) -> Result<AccountId, StopReason> {
    self.set_state(SessionState::Resolving);
    let feed = Arc::clone(&self.feed);
    let client = self.client.clone();

    loop {
      match self.guarded(feed.linked_caregiver(&client)).await? {
        Ok(Some(caregiver)) => {
          self.set_failures(0);
          return Ok(caregiver);
        }
        Ok(None) => {
          debug!(%client, "no linked caregiver");
          return Err(StopReason::NoLink);
        }
        Err(e) => {
          let delay = self.on_failure(e).await?;
          self.sleep(delay).await?;
        }
      }
    }
  }

  async fn poll(&mut self, caregiver: AccountId) -> StopReason {
    info!(client = %self.client, %caregiver, "polling caregiver position");
    self.set_state(SessionState::Polling { caregiver: caregiver.clone() });
    loop {
      if let Err(reason) = self.tick(&caregiver).await {
        return reason;
      }
    }
  }

  /// One read, one update, one sleep.
  async fn tick(&mut self, caregiver: &AccountId) -> Result<(), StopReason> {
    let feed = Arc::clone(&self.feed);
    let delay = match self.guarded(feed.caregiver_position(caregiver)).await? {
      Ok(found) => {
        self.set_failures(0);
        let update = match found {
          Some(fix) => {
            let distance_km = self.home.map(|home| home.distance_km(&fix.coordinates));
            debug!(%caregiver, ?distance_km, "caregiver located");
            ProximityUpdate::Located { caregiver: caregiver.clone(), fix, distance_km }
          }
          None => {
            debug!(%caregiver, "no position reported yet");
            ProximityUpdate::NoDataYet { caregiver: caregiver.clone() }
          }
        };
        self.emit(update).await?;
        self.config.interval
      }
      Err(e) => self.on_failure(e).await?,
    };
    self.sleep(delay).await
  }

  /// Race `read` against cancellation and the read timeout. The outer error
  /// ends the session; the inner one is a failed read.
  async fn guarded<T>(
    &self,
    read: impl Future<Output = Result<T, FeedError>>,
  ) -> Result<Result<T, FeedError>, StopReason> {
    let timeout = self.config.read_timeout;
    tokio::select! {
      biased;
      _ = self.cancel.cancelled() => Err(StopReason::Cancelled),
      res = tokio::time::timeout(timeout, read) => {
        Ok(res.unwrap_or(Err(FeedError::Timeout(timeout))))
      }
    }
  }

  /// Count a failed read and return the delay before the next attempt.
  async fn on_failure(&mut self, error: FeedError) -> Result<Duration, StopReason> {
    let failures = self.failures + 1;
    self.set_failures(failures);
    warn!(client = %self.client, failures, %error, "feed read failed");

    if failures >= self.config.max_consecutive_failures {
      return Err(StopReason::TooManyFailures);
    }
    let retry_in = self.config.retry_delay(failures);
    if failures >= self.config.surface_failures_after {
      self
        .emit(ProximityUpdate::Degraded { consecutive_failures: failures, retry_in })
        .await?;
    }
    Ok(retry_in)
  }

  async fn emit(&self, update: ProximityUpdate) -> Result<(), StopReason> {
    tokio::select! {
      biased;
      _ = self.cancel.cancelled() => Err(StopReason::Cancelled),
      sent = self.updates.send(update) => sent.map_err(|_| StopReason::ViewClosed),
    }
  }

  async fn sleep(&self, delay: Duration) -> Result<(), StopReason> {
    tokio::select! {
      biased;
      _ = self.cancel.cancelled() => Err(StopReason::Cancelled),
      _ = self.updates.closed() => Err(StopReason::ViewClosed),
      _ = tokio::time::sleep(delay) => Ok(()),
    }
  }

  fn set_state(&self, state: SessionState) {
    self.snapshot.send_modify(|s| s.state = state);
  }

  fn set_failures(&mut self, failures: u32) {
    self.failures = failures;
    self.snapshot.send_modify(|s| s.consecutive_failures = failures);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn retry_delay_doubles_up_to_the_cap() {
    let cfg = TrackerConfig::default();
    assert_eq!(cfg.retry_delay(0), Duration::from_secs(3));
    assert_eq!(cfg.retry_delay(1), Duration::from_secs(6));
    assert_eq!(cfg.retry_delay(3), Duration::from_secs(24));
    assert_eq!(cfg.retry_delay(4), Duration::from_secs(30));
    assert_eq!(cfg.retry_delay(40), Duration::from_secs(30));
  }
}
