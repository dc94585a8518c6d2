use crate::error::{BinningError, Result};

/// Normalize a longitude into the half-open range [-180, 180)
///
/// # Examples
/// ```
/// use l3_binner::utils::normalize_longitude;
///
/// assert_eq!(normalize_longitude(190.0), -170.0);
/// assert_eq!(normalize_longitude(180.0), -180.0);
/// ```
pub fn normalize_longitude(lon: f64) -> f64 {
    if (-180.0..180.0).contains(&lon) {
        return lon;
    }
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Wrap a longitude into [origin, origin + 360)
pub fn wrap_longitude_from(lon: f64, origin: f64) -> f64 {
    origin + (lon - origin).rem_euclid(360.0)
}

/// Shift `lon` by ±360° so that it lies within 180° of `reference`
pub fn unwrap_longitude(lon: f64, reference: f64) -> f64 {
    let delta = lon - reference;
    if delta > 180.0 {
        lon - 360.0
    } else if delta < -180.0 {
        lon + 360.0
    } else {
        lon
    }
}

/// Validate a geographic position
pub fn validate_lat_lon(latitude: f64, longitude: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&latitude) || latitude.is_nan() {
        return Err(BinningError::Config(format!(
            "Latitude {} is outside [-90, 90]",
            latitude
        )));
    }

    if !longitude.is_finite() {
        return Err(BinningError::Config(format!(
            "Longitude {} is not finite",
            longitude
        )));
    }

    Ok(())
}
