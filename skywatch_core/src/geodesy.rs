//! Wraparound-aware spherical helpers shared by every engine.
//!
//! All angles are in degrees at the API boundary. Longitudes are
//! canonical in `[-180, 180)`; longitude *differences* are canonical in
//! `(-180, 180]` so that a step across the antimeridian is always the
//! short way round.

/// Mean Earth radius used for all great-circle math (meters).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Length of one degree of arc on the mean sphere (km).
pub const KM_PER_DEGREE_ARC: f64 = EARTH_RADIUS_M / 1000.0 * std::f64::consts::PI / 180.0;

/// Latitude bound applied to render-space paths (Web Mercator blows up at the poles).
pub const MAX_RENDER_LAT: f64 = 85.0;

/// Normalizes a longitude difference into `(-180, 180]`.
///
/// In-range inputs are returned untouched so that exact values stay exact.
#[inline]
pub fn normalize_lon_delta(delta: f64) -> f64 {
    if delta > -180.0 && delta <= 180.0 {
        return delta;
    }
    let wrapped = delta.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Normalizes a longitude into `[-180, 180)`.
#[inline]
pub fn normalize_lon(lon: f64) -> f64 {
    if (-180.0..180.0).contains(&lon) {
        return lon;
    }
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Clamps a latitude into the render-safe band `[-85, 85]`.
#[inline]
pub fn clamp_render_lat(lat: f64) -> f64 {
    lat.clamp(-MAX_RENDER_LAT, MAX_RENDER_LAT)
}

/// Great-circle distance between two points using the haversine formula.
///
/// # Arguments
/// * `lat1`, `lon1` - First point in degrees
/// * `lat2`, `lon2` - Second point in degrees
///
/// # Returns
/// Distance in meters on a sphere of radius [`EARTH_RADIUS_M`].
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = normalize_lon_delta(lon2 - lon1).to_radians();

    let sin_dphi = (d_phi / 2.0).sin();
    let sin_dlambda = (d_lambda / 2.0).sin();

    let a = sin_dphi * sin_dphi + phi1.cos() * phi2.cos() * sin_dlambda * sin_dlambda;
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Great-circle distance in kilometers.
#[inline]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    haversine_m(lat1, lon1, lat2, lon2) / 1000.0
}
