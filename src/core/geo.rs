//! Geographic positions and great-circle distance.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters used for all distance computations.
///
/// Matches the sphere Leaflet's `distanceTo` uses, which is what entry radii
/// were calibrated against.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

impl Position {
    /// Creates a position without validation.
    #[inline]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Creates a position only if both coordinates are finite and in range.
    pub fn checked(lat: f64, lng: f64) -> Option<Self> {
        let pos = Self { lat, lng };
        pos.is_valid().then_some(pos)
    }

    /// Returns true when latitude is in [-90, 90] and longitude in [-180, 180].
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Great-circle distance to `other` in meters.
    #[inline]
    pub fn distance_to(&self, other: &Position) -> f64 {
        haversine_m(self, other)
    }
}

/// Haversine distance between two positions in meters.
pub fn haversine_m(a: &Position, b: &Position) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    // Clamp guards asin against rounding just above 1.0 for antipodal points.
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Unweighted mean of a set of positions, `None` when empty.
pub fn centroid<'a, I>(positions: I) -> Option<Position>
where
    I: IntoIterator<Item = &'a Position>,
{
    let mut n = 0usize;
    let mut lat_sum = 0.0;
    let mut lng_sum = 0.0;
    for p in positions {
        lat_sum += p.lat;
        lng_sum += p.lng;
        n += 1;
    }
    if n == 0 {
        return None;
    }
    Some(Position::new(lat_sum / n as f64, lng_sum / n as f64))
}
