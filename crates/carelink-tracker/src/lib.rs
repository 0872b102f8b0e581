//! Client-side proximity tracking for Carelink.
//!
//! A [`session`] resolves the caregiver linked to a client, then polls that
//! caregiver's last known position on a fixed cadence, emitting
//! [`ProximityUpdate`]s with the distance to the client's home. Reads go
//! through a [`PositionFeed`]; [`client::ApiClient`] is the HTTP
//! implementation against `carelink-server`.

#![allow(async_fn_in_trait)]

pub mod client;
pub mod feed;
pub mod session;

pub use feed::{FeedError, PositionFeed};
pub use session::{
  ProximityUpdate, SessionHandle, SessionSnapshot, SessionState, StopReason, TrackerConfig, spawn,
};

#[cfg(test)]
mod tests;
