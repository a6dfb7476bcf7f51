//! Read-only views handed to display and recording collaborators
//!
//! [`LapSnapshot`] is the recorded schema: recorders typically store each
//! decimal field as a fixed-point integer (value × 10), so every field is
//! clamped to a non-negative range and rounded before it leaves the engine.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::angle_calculator::{PointOfSail, TackSide};
use crate::maneuver::ManeuverStats;

/// Upper bound for speeds and VMG in snapshots (knots)
pub const MAX_SPEED_KN: f32 = 99.9;
/// Upper bound for "seconds since" fields (one day)
pub const MAX_SECONDS: f32 = 86_400.0;
/// Upper bound for lap distance (meters)
pub const MAX_LAP_DISTANCE_M: f32 = 999_999.9;

/// Wind, tack and maneuver state
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WindSnapshot {
    pub wind_direction: f32,
    pub initial_wind_direction: f32,
    pub auto_detection_active: bool,
    pub locked: bool,
    /// Smoothed VMG (knots)
    pub current_vmg: f32,
    pub tack_count: u32,
    pub gybe_count: u32,
    pub last_tack_angle: f32,
    pub last_gybe_angle: f32,
    pub current_tack_side: TackSide,
    pub current_point_of_sail: PointOfSail,
    pub wind_angle_less_cog: f32,
    pub maneuver_stats: ManeuverStats,
}

/// Per-lap values for display and recording, clamped and rounded
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LapSnapshot {
    /// Average upwind VMG (knots, one decimal)
    pub vmg_up: f32,
    /// Average downwind VMG (knots, one decimal)
    pub vmg_down: f32,
    /// Seconds since the last tack (one decimal)
    pub seconds_since_last_tack: f32,
    /// Straight-line distance from the lap start (meters, one decimal)
    pub lap_distance_m: f32,
    /// Average tack angle (whole degrees, 0-180)
    pub avg_tack_angle: u16,
    /// VMG over ground since the lap start (knots, one decimal)
    pub cumulative_lap_vmg: f32,
    /// Percentage of samples above the foiling threshold (0-100)
    pub percent_on_foil: u8,
}

/// Clamp to `[0, max]` and round to one decimal; NaN becomes 0
pub fn clamp_round1(value: f32, max: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    (value.clamp(0.0, max) * 10.0).round() / 10.0
}

/// Clamp to `[0, max]` and round to the nearest integer; NaN becomes 0
pub fn clamp_round_int(value: f32, max: f32) -> u32 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, max).round() as u32
}
