//! Great-circle distance.

use crate::position::Coordinates;

/// Mean Earth radius (IUGG) in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

impl Coordinates {
  /// Haversine distance to `other` in kilometres.
  ///
  /// Symmetric in its arguments and exactly zero for identical points.
  pub fn distance_km(&self, other: &Coordinates) -> f64 {
    let lat1 = self.lat.to_radians();
    let lat2 = other.lat.to_radians();
    let d_lat = (other.lat - self.lat).to_radians();
    let d_lng = (other.lng - self.lng).to_radians();

    let half_lat = (d_lat / 2.0).sin();
    let half_lng = (d_lng / 2.0).sin();
    let a = half_lat * half_lat + lat1.cos() * lat2.cos() * half_lng * half_lng;

    // Rounding can push `a` a hair above 1 for antipodal points.
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
  }
}
