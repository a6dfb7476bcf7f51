//! Distance and bearing between GPS positions
//!
//! [`Geodesic`] is the seam for a device-provided primitive. [`Haversine`]
//! is the default great-circle implementation; [`Planar`] is the
//! equirectangular approximation used whenever the primary fails:
//!
//! ```text
//! dy = Δlat · 111320 m/deg
//! dx = Δlon · 111320 m/deg · cos(mean latitude)
//! ```

use log::debug;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Approximate meters per degree of latitude
pub const METERS_PER_DEGREE_LAT: f64 = 111_320.0;
/// Mean Earth radius (meters)
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;
/// Meters per nautical mile
pub const METERS_PER_NM: f64 = 1852.0;

/// A GPS position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoPoint {
    /// Latitude (degrees, positive north)
    pub lat: f64,
    /// Longitude (degrees, positive east)
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// Geodesic primitive failures
#[derive(Debug, Error, PartialEq)]
pub enum GeodesicError {
    #[error("non-finite coordinate or result")]
    NonFinite,
    #[error("geodesic primitive unavailable: {0}")]
    Unavailable(&'static str),
}

/// Distance (meters) and initial bearing (degrees, 0-360) between positions
pub trait Geodesic {
    fn distance_and_bearing(&self, from: GeoPoint, to: GeoPoint) -> Result<(f64, f64), GeodesicError>;
}

/// Great-circle distance and initial bearing on a spherical Earth
#[derive(Debug, Clone, Copy, Default)]
pub struct Haversine;

impl Geodesic for Haversine {
    fn distance_and_bearing(&self, from: GeoPoint, to: GeoPoint) -> Result<(f64, f64), GeodesicError> {
        if !from.is_finite() || !to.is_finite() {
            return Err(GeodesicError::NonFinite);
        }

        let phi1 = from.lat.to_radians();
        let phi2 = to.lat.to_radians();
        let dphi = phi2 - phi1;
        let dlambda = (to.lon - from.lon).to_radians();

        let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
        let distance = 2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin();

        let y = dlambda.sin() * phi2.cos();
        let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlambda.cos();
        let bearing = y.atan2(x).to_degrees();

        if !distance.is_finite() || !bearing.is_finite() {
            return Err(GeodesicError::NonFinite);
        }
        Ok((distance, normalize_bearing(bearing)))
    }
}

/// Equirectangular approximation, good over lap-sized distances
#[derive(Debug, Clone, Copy, Default)]
pub struct Planar;

impl Geodesic for Planar {
    fn distance_and_bearing(&self, from: GeoPoint, to: GeoPoint) -> Result<(f64, f64), GeodesicError> {
        if !from.is_finite() || !to.is_finite() {
            return Err(GeodesicError::NonFinite);
        }

        let mean_lat = ((from.lat + to.lat) / 2.0).to_radians();
        let dy = (to.lat - from.lat) * METERS_PER_DEGREE_LAT;
        let dx = (to.lon - from.lon) * METERS_PER_DEGREE_LAT * mean_lat.cos();

        let distance = (dx * dx + dy * dy).sqrt();
        // Compass bearing: 0 = north, 90 = east
        let bearing = dx.atan2(dy).to_degrees();
        Ok((distance, normalize_bearing(bearing)))
    }
}

fn normalize_bearing(bearing: f64) -> f64 {
    let wrapped = bearing.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Query `primary`, falling back to [`Planar`] on failure
///
/// Returns None only when the fallback fails too (non-finite input).
pub fn distance_and_bearing_with_fallback(
    primary: &dyn Geodesic,
    from: GeoPoint,
    to: GeoPoint,
) -> Option<(f64, f64)> {
    match primary.distance_and_bearing(from, to) {
        Ok(result) => Some(result),
        Err(e) => {
            debug!("Geodesic primitive failed ({}), using planar approximation", e);
            Planar.distance_and_bearing(from, to).ok()
        }
    }
}
