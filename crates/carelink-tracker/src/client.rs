//! Async HTTP client wrapping the Carelink JSON API.

use std::{collections::HashMap, sync::Mutex, time::Duration};

use carelink_core::{
  position::{HomeView, LiveView},
  subject::AccountId,
};
use reqwest::{Client, Response, StatusCode, header};
use serde::Deserialize;

use crate::feed::{FeedError, PositionFeed};

/// Connection settings for the Carelink API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url:        String,
  pub request_timeout: Duration,
}

#[derive(Deserialize)]
struct LinkBody {
  caregiver_id: AccountId,
}

/// Async HTTP client for the Carelink REST API.
///
/// Remembers the last `ETag` per caregiver so repeated polls of an unchanged
/// position come back as `304 Not Modified`.
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
  last:   Mutex<HashMap<AccountId, (String, LiveView)>>,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self, FeedError> {
    let client = Client::builder().timeout(config.request_timeout).build()?;
    Ok(Self { client, config, last: Mutex::new(HashMap::new()) })
  }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  /// `GET /api/clients/<id>/home`: `None` when no home can be determined.
  pub async fn client_home(&self, client: &AccountId) -> Result<Option<HomeView>, FeedError> {
    let resp = self
      .client
      .get(self.url(&format!("/clients/{client}/home")))
      .send()
      .await?;
    match resp.status() {
      StatusCode::NOT_FOUND => Ok(None),
      s if s.is_success() => Ok(Some(resp.json().await?)),
      s => Err(FeedError::Status(s)),
    }
  }

  fn cached(&self, caregiver: &AccountId) -> Option<(String, LiveView)> {
    self
      .last
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .get(caregiver)
      .cloned()
  }

  fn remember(&self, caregiver: &AccountId, entry: Option<(String, LiveView)>) {
    let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    match entry {
      Some(entry) => last.insert(caregiver.clone(), entry),
      None => last.remove(caregiver),
    };
  }

  async fn read_position(
    &self,
    caregiver: &AccountId,
    resp: Response,
  ) -> Result<Option<LiveView>, FeedError> {
    match resp.status() {
      StatusCode::NOT_MODIFIED => self
        .cached(caregiver)
        .map(|(_, view)| Some(view))
        .ok_or(FeedError::StaleCache),
      StatusCode::NOT_FOUND => {
        self.remember(caregiver, None);
        Ok(None)
      }
      s if s.is_success() => {
        let etag = resp
          .headers()
          .get(header::ETAG)
          .and_then(|v| v.to_str().ok())
          .map(str::to_string);
        let view: LiveView = resp.json().await?;
        self.remember(caregiver, etag.map(|tag| (tag, view.clone())));
        Ok(Some(view))
      }
      s => Err(FeedError::Status(s)),
    }
  }
}

impl PositionFeed for ApiClient {
  /// `GET /api/links/<client>`
  async fn linked_caregiver<'a>(
    &'a self,
    client: &'a AccountId,
  ) -> Result<Option<AccountId>, FeedError> {
    let resp = self
      .client
      .get(self.url(&format!("/links/{client}")))
      .send()
      .await?;
    match resp.status() {
      StatusCode::NOT_FOUND => Ok(None),
      s if s.is_success() => Ok(Some(resp.json::<LinkBody>().await?.caregiver_id)),
      s => Err(FeedError::Status(s)),
    }
  }

  /// `GET /api/positions/<caregiver>?role=caregiver`
  async fn caregiver_position<'a>(
    &'a self,
    caregiver: &'a AccountId,
  ) -> Result<Option<LiveView>, FeedError> {
    let mut req = self
      .client
      .get(self.url(&format!("/positions/{caregiver}")))
      .query(&[("role", "caregiver")]);
    if let Some((etag, _)) = self.cached(caregiver) {
      req = req.header(header::IF_NONE_MATCH, etag);
    }
    let resp = req.send().await?;
    self.read_position(caregiver, resp).await
  }
}
