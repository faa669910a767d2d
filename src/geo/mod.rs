//! Great-circle distances between transplant centers.
//!
//! The pairwise index is derived offline from the facility list and written
//! to a TSV that consumers load read-only for radius queries.

mod cache;
mod index;

pub use cache::HaversineCache;
pub use index::{DistanceEdge, DistanceIndex};

/// Mean Earth radius in nautical miles.
pub const EARTH_RADIUS_NM: f64 = 3444.0;

/// Haversine distance in nautical miles between two points in degrees.
pub fn haversine_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_NM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        assert_eq!(haversine_nm(40.0, -74.0, 40.0, -74.0), 0.0);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        // One degree along a meridian is R * pi / 180.
        let expected = EARTH_RADIUS_NM * std::f64::consts::PI / 180.0;
        assert!((haversine_nm(10.0, 20.0, 11.0, 20.0) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_symmetric() {
        let ab = haversine_nm(34.05, -118.24, 40.71, -74.0);
        let ba = haversine_nm(40.71, -74.0, 34.05, -118.24);
        assert!((ab - ba).abs() < 1e-9);
        // Los Angeles to New York is roughly 2,130 nm.
        assert!((2100.0..2160.0).contains(&ab));
    }
}
