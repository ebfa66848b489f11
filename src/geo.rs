/// Mean Earth radius used for trip distances, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

pub fn to_radians(deg: f64) -> f64 {
    deg * (std::f64::consts::PI / 180.0)
}

/// Great-circle distance between two coordinates using the Haversine formula.
/// Returns distance in kilometers.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = to_radians(lat2 - lat1);
    let d_lon = to_radians(lon2 - lon1);

    let a = (d_lat / 2.0).sin().powi(2)
        + to_radians(lat1).cos() * to_radians(lat2).cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Rounds a distance to meter precision (3 decimals of a kilometer).
pub fn round_km(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
