//! Session tests against a scripted feed on paused time.

use std::{
  collections::VecDeque,
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use carelink_core::{
  position::{Coordinates, LiveView},
  subject::AccountId,
};
use chrono::{TimeZone as _, Utc};
use reqwest::StatusCode;

use crate::{
  FeedError, PositionFeed, ProximityUpdate, SessionState, StopReason, TrackerConfig, spawn,
};

// ─── Scripted feed ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Step {
  Found(Coordinates),
  Missing,
  Fail,
  /// Answers `Missing` after the given delay.
  Slow(Duration),
  /// Never answers.
  Hang,
}

struct ScriptedFeed {
  link:          Option<AccountId>,
  link_failures: AtomicUsize,
  link_lookups:  AtomicUsize,
  script:        Mutex<VecDeque<Step>>,
  fallback:      Step,
  reads:         AtomicUsize,
  in_flight:     AtomicUsize,
  max_in_flight: AtomicUsize,
}

impl ScriptedFeed {
  fn new(link: Option<&str>, script: Vec<Step>, fallback: Step) -> Arc<Self> {
    Arc::new(Self {
      link: link.map(account),
      link_failures: AtomicUsize::new(0),
      link_lookups: AtomicUsize::new(0),
      script: Mutex::new(script.into()),
      fallback,
      reads: AtomicUsize::new(0),
      in_flight: AtomicUsize::new(0),
      max_in_flight: AtomicUsize::new(0),
    })
  }

  /// Make the first `n` link lookups fail.
  fn failing_link(self: Arc<Self>, n: usize) -> Arc<Self> {
    self.link_failures.store(n, Ordering::SeqCst);
    self
  }

  fn next_step(&self) -> Step {
    self
      .script
      .lock()
      .unwrap()
      .pop_front()
      .unwrap_or_else(|| self.fallback.clone())
  }
}

/// Decrements the in-flight counter when a read completes or is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
  fn drop(&mut self) { self.0.fetch_sub(1, Ordering::SeqCst); }
}

impl PositionFeed for ScriptedFeed {
  async fn linked_caregiver<'a>(
    &'a self,
    _client: &'a AccountId,
  ) -> Result<Option<AccountId>, FeedError> {
    let attempt = self.link_lookups.fetch_add(1, Ordering::SeqCst);
    if attempt < self.link_failures.load(Ordering::SeqCst) {
      return Err(FeedError::Status(StatusCode::BAD_GATEWAY));
    }
    Ok(self.link.clone())
  }

  async fn caregiver_position<'a>(
    &'a self,
    _caregiver: &'a AccountId,
  ) -> Result<Option<LiveView>, FeedError> {
    self.reads.fetch_add(1, Ordering::SeqCst);
    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    let _guard = InFlight(&self.in_flight);

    match self.next_step() {
      Step::Found(coordinates) => Ok(Some(fix(coordinates))),
      Step::Missing => Ok(None),
      Step::Fail => Err(FeedError::Status(StatusCode::SERVICE_UNAVAILABLE)),
      Step::Slow(delay) => {
        tokio::time::sleep(delay).await;
        Ok(None)
      }
      Step::Hang => std::future::pending().await,
    }
  }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn account(id: &str) -> AccountId { AccountId::parse(id).unwrap() }

fn fix(coordinates: Coordinates) -> LiveView {
  LiveView {
    coordinates,
    accuracy: Some(8.0),
    updated_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
  }
}

const HOME: Coordinates = Coordinates { lat: -23.5505, lng: -46.6333 };
const NEARBY: Coordinates = Coordinates { lat: -23.5487, lng: -46.6341 };

fn config() -> TrackerConfig {
  TrackerConfig {
    interval:                 Duration::from_secs(1),
    read_timeout:             Duration::from_secs(2),
    backoff_cap:              Duration::from_secs(8),
    surface_failures_after:   2,
    max_consecutive_failures: 5,
  }
}

// ─── Resolution ───────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn no_link_stops_without_polling() {
  let feed = ScriptedFeed::new(None, vec![], Step::Missing);
  let (handle, mut updates) = spawn(feed.clone(), account("cl-1"), Some(HOME), config());
  let snapshot = handle.snapshot();

  assert_eq!(updates.recv().await, None);
  assert_eq!(handle.join().await.unwrap(), StopReason::NoLink);
  assert_eq!(snapshot.borrow().state, SessionState::Stopped(StopReason::NoLink));
  assert_eq!(feed.reads.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn link_failures_back_off_then_polling_starts() {
  let feed = ScriptedFeed::new(Some("cg-1"), vec![], Step::Missing).failing_link(3);
  let (handle, mut updates) = spawn(feed.clone(), account("cl-1"), Some(HOME), config());
  let snapshot = handle.snapshot();

  assert_eq!(
    updates.recv().await,
    Some(ProximityUpdate::Degraded {
      consecutive_failures: 2,
      retry_in:             Duration::from_secs(4),
    })
  );
  assert_eq!(snapshot.borrow().state, SessionState::Resolving);
  assert_eq!(
    updates.recv().await,
    Some(ProximityUpdate::Degraded {
      consecutive_failures: 3,
      retry_in:             Duration::from_secs(8),
    })
  );
  assert_eq!(
    updates.recv().await,
    Some(ProximityUpdate::NoDataYet { caregiver: account("cg-1") })
  );
  assert_eq!(snapshot.borrow().state, SessionState::Polling { caregiver: account("cg-1") });
  assert_eq!(snapshot.borrow().consecutive_failures, 0);
  assert_eq!(feed.link_lookups.load(Ordering::SeqCst), 4);

  handle.cancel();
  assert_eq!(handle.join().await.unwrap(), StopReason::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn link_failures_give_up_before_polling() {
  let feed = ScriptedFeed::new(Some("cg-1"), vec![], Step::Missing).failing_link(usize::MAX);
  let (handle, mut updates) = spawn(feed.clone(), account("cl-1"), Some(HOME), config());
  let snapshot = handle.snapshot();

  let mut degraded = Vec::new();
  while let Some(update) = updates.recv().await {
    match update {
      ProximityUpdate::Degraded { consecutive_failures, .. } => {
        degraded.push(consecutive_failures)
      }
      other => panic!("unexpected update while resolving: {other:?}"),
    }
  }

  assert_eq!(degraded, vec![2, 3, 4]);
  assert_eq!(handle.join().await.unwrap(), StopReason::TooManyFailures);
  assert_eq!(snapshot.borrow().state, SessionState::Stopped(StopReason::TooManyFailures));
  assert_eq!(feed.link_lookups.load(Ordering::SeqCst), 5);
  assert_eq!(feed.reads.load(Ordering::SeqCst), 0);
}

// ─── Polling ──────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn located_update_carries_distance() {
  let feed = ScriptedFeed::new(Some("cg-1"), vec![Step::Found(NEARBY)], Step::Missing);
  let (handle, mut updates) = spawn(feed, account("cl-1"), Some(HOME), config());

  match updates.recv().await.unwrap() {
    ProximityUpdate::Located { caregiver, fix, distance_km } => {
      assert_eq!(caregiver, account("cg-1"));
      assert_eq!(fix.coordinates, NEARBY);
      let d = distance_km.unwrap();
      assert!((0.18..=0.22).contains(&d), "got {d}");
    }
    other => panic!("expected Located, got {other:?}"),
  }
  assert_eq!(
    handle.snapshot().borrow().state,
    SessionState::Polling { caregiver: account("cg-1") }
  );

  handle.cancel();
  assert_eq!(handle.join().await.unwrap(), StopReason::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn unknown_home_still_reports_the_fix() {
  let feed = ScriptedFeed::new(Some("cg-1"), vec![Step::Found(NEARBY)], Step::Missing);
  let (handle, mut updates) = spawn(feed, account("cl-1"), None, config());

  assert!(matches!(
    updates.recv().await,
    Some(ProximityUpdate::Located { distance_km: None, .. })
  ));
  handle.cancel();
}

#[tokio::test(start_paused = true)]
async fn no_data_is_a_steady_state() {
  let feed = ScriptedFeed::new(Some("cg-1"), vec![], Step::Missing);
  let (handle, mut updates) = spawn(feed.clone(), account("cl-1"), Some(HOME), config());

  for _ in 0..50 {
    assert_eq!(
      updates.recv().await,
      Some(ProximityUpdate::NoDataYet { caregiver: account("cg-1") })
    );
  }
  assert_eq!(handle.snapshot().borrow().consecutive_failures, 0);
  assert!(matches!(handle.snapshot().borrow().state, SessionState::Polling { .. }));

  handle.cancel();
  assert_eq!(handle.join().await.unwrap(), StopReason::Cancelled);
}

// ─── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failures_back_off_then_recover() {
  let script = vec![Step::Fail, Step::Fail, Step::Fail, Step::Found(NEARBY)];
  let feed = ScriptedFeed::new(Some("cg-1"), script, Step::Missing);
  let (handle, mut updates) = spawn(feed, account("cl-1"), Some(HOME), config());
  let snapshot = handle.snapshot();

  // The first failure is silent; the second and third surface with a
  // doubling delay.
  assert_eq!(
    updates.recv().await,
    Some(ProximityUpdate::Degraded {
      consecutive_failures: 2,
      retry_in:             Duration::from_secs(4),
    })
  );
  assert_eq!(
    updates.recv().await,
    Some(ProximityUpdate::Degraded {
      consecutive_failures: 3,
      retry_in:             Duration::from_secs(8),
    })
  );
  assert_eq!(snapshot.borrow().consecutive_failures, 3);

  assert!(matches!(updates.recv().await, Some(ProximityUpdate::Located { .. })));
  assert_eq!(snapshot.borrow().consecutive_failures, 0);
  assert!(matches!(snapshot.borrow().state, SessionState::Polling { .. }));

  handle.cancel();
}

#[tokio::test(start_paused = true)]
async fn backoff_is_capped() {
  let feed = ScriptedFeed::new(Some("cg-1"), vec![], Step::Fail);
  let cfg = TrackerConfig { max_consecutive_failures: 8, ..config() };
  let (handle, mut updates) = spawn(feed, account("cl-1"), Some(HOME), cfg);

  let mut delays = Vec::new();
  while let Some(update) = updates.recv().await {
    if let ProximityUpdate::Degraded { retry_in, .. } = update {
      delays.push(retry_in.as_secs());
    }
  }
  assert_eq!(delays, vec![4, 8, 8, 8, 8, 8]);
  assert_eq!(handle.join().await.unwrap(), StopReason::TooManyFailures);
}

#[tokio::test(start_paused = true)]
async fn timeouts_count_and_eventually_give_up() {
  let feed = ScriptedFeed::new(Some("cg-1"), vec![], Step::Hang);
  let (handle, mut updates) = spawn(feed.clone(), account("cl-1"), Some(HOME), config());
  let snapshot = handle.snapshot();

  let mut degraded = 0;
  while let Some(update) = updates.recv().await {
    assert!(matches!(update, ProximityUpdate::Degraded { .. }));
    degraded += 1;
  }

  assert_eq!(degraded, 3);
  assert_eq!(handle.join().await.unwrap(), StopReason::TooManyFailures);
  assert_eq!(feed.reads.load(Ordering::SeqCst), 5);
  assert_eq!(feed.in_flight.load(Ordering::SeqCst), 0);
  assert_eq!(snapshot.borrow().state, SessionState::Stopped(StopReason::TooManyFailures));
}

// ─── Teardown ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn cancel_returns_within_a_tick_while_a_read_hangs() {
  let cfg = TrackerConfig { read_timeout: Duration::from_secs(60), ..config() };
  let feed = ScriptedFeed::new(Some("cg-1"), vec![Step::Hang], Step::Missing);
  let (handle, _updates) = spawn(feed.clone(), account("cl-1"), Some(HOME), cfg.clone());

  while feed.in_flight.load(Ordering::SeqCst) == 0 {
    tokio::task::yield_now().await;
  }
  handle.cancel();

  let reason = tokio::time::timeout(cfg.interval, handle.join())
    .await
    .expect("session did not stop within one tick")
    .unwrap();
  assert_eq!(reason, StopReason::Cancelled);
  assert_eq!(feed.in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_view_stops_the_session() {
  let feed = ScriptedFeed::new(Some("cg-1"), vec![], Step::Missing);
  let (handle, updates) = spawn(feed, account("cl-1"), Some(HOME), config());
  drop(updates);

  assert_eq!(handle.join().await.unwrap(), StopReason::ViewClosed);
}

#[tokio::test(start_paused = true)]
async fn slow_reads_never_overlap() {
  let cfg = TrackerConfig { read_timeout: Duration::from_secs(10), ..config() };
  let feed = ScriptedFeed::new(Some("cg-1"), vec![], Step::Slow(Duration::from_secs(3)));
  let (handle, mut updates) = spawn(feed.clone(), account("cl-1"), Some(HOME), cfg);

  for _ in 0..5 {
    assert!(matches!(updates.recv().await, Some(ProximityUpdate::NoDataYet { .. })));
  }
  handle.cancel();
  handle.join().await.unwrap();

  assert!(feed.reads.load(Ordering::SeqCst) >= 5);
  assert_eq!(feed.max_in_flight.load(Ordering::SeqCst), 1);
}
