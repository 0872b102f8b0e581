//! Client home resolution with a self-healing geocoding fallback.
//!
//! The first resolution for a client pays for one geocoding call and stores
//! the result under the client's account id. Every later resolution is a
//! plain store read. A stored home is never invalidated.

use tracing::{debug, info};

use crate::{
  Error, Result,
  geocode::Geocoder,
  position::{NewPosition, PositionRecord, PositionSource, Role},
  store::{PositionStore, ProfileDirectory},
  subject::{AccountId, SubjectKey},
};

/// Return the stored home record for `client`, geocoding and persisting one
/// from the profile's postal code on first use.
pub async fn resolve_home<S, P, G>(
  store: &S,
  profiles: &P,
  geocoder: &G,
  client: &AccountId,
) -> Result<PositionRecord>
where
  S: PositionStore,
  P: ProfileDirectory,
  G: Geocoder,
{
  let key = SubjectKey::Account(client.clone());

  if let Some(record) = store
    .get_position(&key, Role::Client)
    .await
    .map_err(Error::store)?
  {
    debug!(%client, "home position served from store");
    return Ok(record);
  }

  let postal_code = profiles
    .postal_code(client)
    .await
    .map_err(Error::store)?
    .filter(|code| !code.trim().is_empty())
    .ok_or_else(|| {
      Error::NoLocationAvailable(format!("client {client} has no postal code"))
    })?;

  let coordinates = geocoder.resolve(postal_code.trim()).await.ok_or_else(|| {
    Error::NoLocationAvailable(format!(
      "postal code for client {client} could not be geocoded"
    ))
  })?;

  let record = store
    .upsert_position(NewPosition {
      subject_key: key,
      role: Role::Client,
      coordinates,
      accuracy: None,
      source: PositionSource::GeocodedFallback,
    })
    .await
    .map_err(Error::store)?;

  info!(%client, "home position geocoded and stored");
  Ok(record)
}
