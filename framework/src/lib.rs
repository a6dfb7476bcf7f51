//! Wind-Relative Sailing Navigation Engine
//!
//! Derives wind direction, point of sail, tack, velocity made good and
//! discrete maneuvers (tacks and gybes) from a single noisy GPS course and
//! speed stream, with no wind sensor. Statistics are kept both for the
//! session and per user-marked lap.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  WindTracker (wind state, pipeline, views)  │
//! ├──────────────┬──────────────┬───────────────┤
//! │ Angle        │ Maneuver     │ Vmg   │ Lap   │
//! │ Calculator   │ Detector     │ Calc  │ Track │
//! ├──────────────┴──────────────┴───────────────┤
//! │  angles · history · geodesic                │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use sail_nav::{NavConfig, PositionSample, WindTracker};
//!
//! let mut tracker = WindTracker::new(NavConfig::default(), 180.0);
//! tracker.on_lap_mark_requested(None, 0);
//!
//! // 1 Hz fixes: course in radians, speed in m/s
//! for t in 0..30u32 {
//!     let sample = PositionSample::new(135f32.to_radians(), 5.0, t * 1000);
//!     tracker.on_position_sample(sample).unwrap();
//! }
//!
//! let wind = tracker.wind_snapshot();
//! assert_eq!(wind.tack_count, 0);
//! let lap = tracker.lap_snapshot(30_000);
//! assert_eq!(lap.percent_on_foil, 100);
//! ```
//!
//! ## Modules
//!
//! - [`wind_tracker`] - Orchestrator and wind-direction state
//! - [`angle_calculator`] - Course smoothing, wind angle, tack and point of sail
//! - [`maneuver`] - Tack/gybe detection and delayed angle measurement
//! - [`vmg`] - Smoothed velocity made good
//! - [`lap_tracker`] - Per-lap aggregation
//! - [`config`] - Runtime configuration

pub mod angle_calculator;
pub mod angles;
pub mod config;
pub mod geodesic;
pub mod history;
pub mod lap_tracker;
pub mod maneuver;
pub mod sample;
pub mod snapshot;
pub mod vmg;
pub mod wind_tracker;

#[cfg(test)]
pub(crate) mod testkit;

// Re-export commonly used types
pub use angle_calculator::{AngleCalculator, PointOfSail, TackSide};
pub use config::{ConfigError, NavConfig};
pub use geodesic::{GeoPoint, Geodesic, GeodesicError, Haversine, Planar};
pub use lap_tracker::{LapRecord, LapStats, LapTracker};
pub use maneuver::{ManeuverDetector, ManeuverKind, ManeuverRecord, ManeuverStats};
pub use sample::{PositionSample, SampleError};
pub use snapshot::{LapSnapshot, WindSnapshot};
pub use vmg::VmgCalculator;
pub use wind_tracker::{WindState, WindTracker};
