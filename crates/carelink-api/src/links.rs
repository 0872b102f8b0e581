//! Handler for `GET /links/:client_id`.

use axum::{
  Json,
  extract::{Path, State},
};
use carelink_core::{geocode::Geocoder, locate::linked_caregiver, subject::AccountId};
use serde::Serialize;

use crate::{ApiState, Backend, error::ApiError};

#[derive(Debug, Serialize)]
pub struct LinkBody {
  pub caregiver_id: AccountId,
}

/// `GET /links/:client_id`: 404 when the client has no caregiver.
pub async fn get_one<S, G>(
  State(state): State<ApiState<S, G>>,
  Path(client_id): Path<String>,
) -> Result<Json<LinkBody>, ApiError>
where
  S: Backend,
  G: Geocoder + 'static,
{
  let client = AccountId::parse(&client_id)?;
  let caregiver_id = linked_caregiver(state.store.as_ref(), &client)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("client {client} has no linked caregiver")))?;
  Ok(Json(LinkBody { caregiver_id }))
}
