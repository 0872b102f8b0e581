//! Handler for `GET /clients/:client_id/home`.
//!
//! The first request for a client may geocode its postal code; every later
//! request is served from the store.

use axum::{
  Json,
  extract::{Path, State},
};
use carelink_core::{
  geocode::Geocoder,
  home::resolve_home,
  position::HomeView,
  subject::AccountId,
};

use crate::{ApiState, Backend, error::ApiError};

/// `GET /clients/:client_id/home`: 404 when no home can be derived.
pub async fn home<S, G>(
  State(state): State<ApiState<S, G>>,
  Path(client_id): Path<String>,
) -> Result<Json<HomeView>, ApiError>
where
  S: Backend,
  G: Geocoder + 'static,
{
  let client = AccountId::parse(&client_id)?;
  let record = resolve_home(
    state.store.as_ref(),
    state.store.as_ref(),
    state.geocoder.as_ref(),
    &client,
  )
  .await?;
  Ok(Json(HomeView::from(&record)))
}
