/// Mean Earth radius in meters used for every distance computation.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance in meters between two (latitude, longitude) pairs
/// given in degrees, using the haversine formula.
///
/// The `atan2` form is used instead of `asin` so that identical coordinates
/// come out as exactly zero.
pub fn distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlng = (lng2 - lng1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

// Located is anything with a position on the globe.
pub trait Located {
    fn latitude(&self) -> f64;
    fn longitude(&self) -> f64;

    /// Distance in meters from this position to the given coordinate.
    fn distance_to(&self, lat: f64, lng: f64) -> f64 {
        distance(self.latitude(), self.longitude(), lat, lng)
    }
}

impl Located for (f64, f64) {
    fn latitude(&self) -> f64 {
        self.0
    }

    fn longitude(&self) -> f64 {
        self.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_coordinates_is_zero() {
        assert_eq!(distance(37.7749, -122.4194, 37.7749, -122.4194), 0.0);
        assert_eq!(distance(0.0, 0.0, 0.0, 0.0), 0.0);
        assert_eq!(distance(-89.9, 179.9, -89.9, 179.9), 0.0);
    }

    #[test]
    fn san_francisco_to_los_angeles() {
        let d = distance(37.7749, -122.4194, 34.0522, -118.2437);
        assert!((d - 559_121.0).abs() < 1000.0, "got {}", d);
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = distance(37.0, -122.0, 38.0, -122.0);
        assert!((d - 111_195.0).abs() < 1000.0, "got {}", d);
    }

    #[test]
    fn crossing_prime_meridian() {
        let d = distance(51.5074, -0.1278, 51.5074, 0.1278);
        assert!(d > 0.0);
        assert!(d < 50_000.0);
    }

    #[test]
    fn polar_region() {
        let d = distance(89.0, 0.0, 89.0, 180.0);
        assert!(d > 0.0);
        assert!(d < 500_000.0);
    }

    #[test]
    fn symmetric() {
        let ab = distance(40.7128, -74.0060, 51.5074, -0.1278);
        let ba = distance(51.5074, -0.1278, 40.7128, -74.0060);
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn tuple_is_located() {
        let p = (37.7749, -122.4194);
        assert_eq!(p.distance_to(37.7749, -122.4194), 0.0);
        assert!(p.distance_to(34.0522, -118.2437) > 500_000.0);
    }
}
