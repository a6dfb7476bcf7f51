//! Position samples as delivered by the host GPS
//!
//! Heading units are ambiguous at the source: some hosts report course in
//! radians, others in degrees. Values below 2π are taken as radians. A
//! genuine course of less than ~6.3° reported in degrees is therefore
//! misread; this is a known limitation of the input seam.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::geodesic::GeoPoint;

/// Meters per second to knots
pub const MPS_TO_KNOTS: f32 = 1.943_844;

/// Headings below this are treated as radians
pub const RADIAN_HEADING_LIMIT: f32 = 2.0 * std::f32::consts::PI;

/// Why a sample was dropped
///
/// Dropped samples leave the engine untouched.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum SampleError {
    #[error("sample has no heading")]
    MissingHeading,
    #[error("sample has no speed")]
    MissingSpeed,
    #[error("non-finite {0}")]
    NonFinite(&'static str),
}

/// One GPS fix
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionSample {
    /// Course over ground, radians or degrees (see module docs)
    pub heading: Option<f32>,
    /// Speed over ground (m/s)
    pub speed_mps: Option<f32>,
    pub position: Option<GeoPoint>,
    /// Monotonic timestamp (ms)
    pub timestamp_ms: u32,
    /// Wall-clock time of the fix, if known
    pub utc: Option<DateTime<Utc>>,
}

impl PositionSample {
    pub fn new(heading: f32, speed_mps: f32, timestamp_ms: u32) -> Self {
        Self {
            heading: Some(heading),
            speed_mps: Some(speed_mps),
            timestamp_ms,
            ..Default::default()
        }
    }

    pub fn with_position(mut self, position: GeoPoint) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_utc(mut self, utc: DateTime<Utc>) -> Self {
        self.utc = Some(utc);
        self
    }

    /// Heading in degrees and speed in knots, or why the sample is unusable
    pub fn heading_and_speed(&self) -> Result<(f32, f32), SampleError> {
        let heading = self.heading.ok_or(SampleError::MissingHeading)?;
        let speed = self.speed_mps.ok_or(SampleError::MissingSpeed)?;
        // Checked after conversion: huge finite radians overflow to infinity
        let heading = heading_to_degrees(heading);
        if !heading.is_finite() {
            return Err(SampleError::NonFinite("heading"));
        }
        let speed = speed.max(0.0) * MPS_TO_KNOTS;
        if !speed.is_finite() {
            return Err(SampleError::NonFinite("speed"));
        }
        Ok((heading, speed))
    }
}

/// Interpret a raw heading, converting radians to degrees
pub fn heading_to_degrees(raw: f32) -> f32 {
    if raw < RADIAN_HEADING_LIMIT {
        raw.to_degrees()
    } else {
        raw
    }
}
