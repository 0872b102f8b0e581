//! The Geocoding Adapter contract.

use std::future::Future;

use crate::position::Coordinates;

/// Resolves a postal code into coordinates through an external provider.
///
/// Implementations are stateless. Provider errors and empty result sets both
/// come back as `None`: the caller cannot act on provider-specific detail,
/// and the same code may resolve on a later attempt.
pub trait Geocoder: Send + Sync {
  fn resolve<'a>(
    &'a self,
    postal_code: &'a str,
  ) -> impl Future<Output = Option<Coordinates>> + Send + 'a;
}
