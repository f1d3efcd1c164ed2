//! Great-circle geometry helpers.

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Coverage box of the subscribed feed, Red Sea through the Arabian Gulf.
///
/// Advisory only: positions outside the box are still recorded, the box
/// merely drives a diagnostic log line.
pub const REGION_LAT: (f64, f64) = (12.0, 35.0);
pub const REGION_LON: (f64, f64) = (32.0, 55.0);

/// Great-circle distance between two coordinates, via the haversine formula.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

pub fn within_region(lat: f64, lon: f64) -> bool {
    lat >= REGION_LAT.0 && lat <= REGION_LAT.1 && lon >= REGION_LON.0 && lon <= REGION_LON.1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_same_point() {
        let d = haversine_km(21.4858, 39.1925, 21.4858, 39.1925);
        assert!(d < 1e-9);
    }

    #[test]
    fn small_offset_at_equator() {
        // 0.001 degrees of longitude at the equator is roughly 111 meters
        let d = haversine_km(0.0, 0.0, 0.0, 0.001);
        assert!(d > 0.10 && d < 0.12);
    }

    #[test]
    fn jeddah_to_yanbu() {
        let d = haversine_km(21.4858, 39.1925, 24.0896, 38.0618);
        assert!(d > 300.0 && d < 320.0);
    }

    #[test]
    fn region_check() {
        assert!(within_region(21.5, 39.2));
        assert!(!within_region(61.8, 28.9));
        assert!(!within_region(21.5, 60.0));
    }
}
