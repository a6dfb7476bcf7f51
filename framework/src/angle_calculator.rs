//! Course smoothing and wind-relative angle state
//!
//! Turns raw course over ground into:
//! - a smoothed heading (EMA on the wrapped delta, so 359° → 1° is a 2° step)
//! - a time-stamped heading history for windowed circular averages
//! - the wind angle relative to course, `wind − heading` in (-180, 180]
//! - the current tack side and point of sail
//!
//! The tack side is initialized from the first sample only. After that it
//! changes when the maneuver detector confirms a crossing (see
//! [`AngleCalculator::set_tack_side`]), never directly from the angle.

use log::{debug, trace};

use crate::angles::{normalize_degrees, normalize_signed, signed_delta};
use crate::history::{HeadingHistory, HeadingSample};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default EMA factor for heading smoothing
pub const DEFAULT_HEADING_ALPHA: f32 = 0.15;

/// Which side of the boat the wind is coming over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TackSide {
    Port,
    Starboard,
}

impl TackSide {
    /// Starboard iff the wind angle is >= 0
    pub fn from_wind_angle(wind_angle: f32) -> Self {
        if wind_angle >= 0.0 {
            TackSide::Starboard
        } else {
            TackSide::Port
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            TackSide::Port => TackSide::Starboard,
            TackSide::Starboard => TackSide::Port,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TackSide::Port => "PORT",
            TackSide::Starboard => "STARBOARD",
        }
    }
}

/// Upwind or downwind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PointOfSail {
    Upwind,
    Downwind,
}

impl PointOfSail {
    /// Upwind iff the wind angle lies in (-90, 90)
    pub fn from_wind_angle(wind_angle: f32) -> Self {
        if wind_angle.abs() < 90.0 {
            PointOfSail::Upwind
        } else {
            PointOfSail::Downwind
        }
    }

    pub fn is_upwind(&self) -> bool {
        *self == PointOfSail::Upwind
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PointOfSail::Upwind => "UPWIND",
            PointOfSail::Downwind => "DOWNWIND",
        }
    }
}

/// Smoothed course and wind-relative angle tracker
#[derive(Debug, Clone)]
pub struct AngleCalculator {
    alpha: f32,
    smoothed_heading: Option<f32>,
    history: HeadingHistory,

    wind_angle_less_cog: f32,
    previous_wind_angle: f32,

    tack_side: TackSide,
    point_of_sail: PointOfSail,
    /// Point of sail of the sample before the current one
    previous_point_of_sail: PointOfSail,
    sides_initialized: bool,
}

impl AngleCalculator {
    /// Create a calculator with the given EMA factor and history capacity
    ///
    /// An alpha of 1.0 disables smoothing.
    pub fn new(alpha: f32, history_capacity: usize) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            smoothed_heading: None,
            history: HeadingHistory::with_capacity(history_capacity),
            wind_angle_less_cog: 0.0,
            previous_wind_angle: 0.0,
            tack_side: TackSide::Starboard,
            point_of_sail: PointOfSail::Upwind,
            previous_point_of_sail: PointOfSail::Upwind,
            sides_initialized: false,
        }
    }

    /// Process one raw course sample
    ///
    /// # Arguments
    /// * `raw_heading` - Course over ground in degrees (any range)
    /// * `timestamp_ms` - Monotonic timestamp of the sample
    /// * `wind_direction` - Current wind direction estimate in degrees
    ///
    /// # Returns
    /// The smoothed heading in [0, 360)
    pub fn process_heading(&mut self, raw_heading: f32, timestamp_ms: u32, wind_direction: f32) -> f32 {
        let heading = normalize_degrees(raw_heading);

        let smoothed = match self.smoothed_heading {
            // First sample seeds the filter (no warm-up from 0°)
            None => heading,
            Some(prev) => normalize_degrees(prev + self.alpha * signed_delta(prev, heading)),
        };
        self.smoothed_heading = Some(smoothed);
        self.history.push(HeadingSample::new(smoothed, timestamp_ms));

        let angle = normalize_signed(wind_direction - smoothed);
        self.previous_wind_angle = self.wind_angle_less_cog;
        self.previous_point_of_sail = self.point_of_sail;
        self.wind_angle_less_cog = angle;

        let point_of_sail = PointOfSail::from_wind_angle(angle);

        if !self.sides_initialized {
            // Initial state, not a transition
            self.tack_side = TackSide::from_wind_angle(angle);
            self.point_of_sail = point_of_sail;
            self.previous_point_of_sail = point_of_sail;
            self.previous_wind_angle = angle;
            self.sides_initialized = true;
            debug!(
                "Angles initialized: heading={:.1} wind_angle={:.1} {} {}",
                smoothed,
                angle,
                self.tack_side.as_str(),
                self.point_of_sail.as_str()
            );
            return smoothed;
        }

        if point_of_sail != self.point_of_sail {
            debug!(
                "Point of sail {} -> {} (wind_angle={:.1})",
                self.point_of_sail.as_str(),
                point_of_sail.as_str(),
                angle
            );
        }
        self.point_of_sail = point_of_sail;

        let implied = TackSide::from_wind_angle(angle);
        if implied != self.tack_side {
            trace!(
                "Wind angle {:.1} implies {} while on {}",
                angle,
                implied.as_str(),
                self.tack_side.as_str()
            );
        }

        smoothed
    }

    /// Circular mean of the heading history over `[start_ms, end_ms]`
    ///
    /// None means insufficient data, never a valid 0° heading.
    pub fn calculate_average_heading(&self, start_ms: u32, end_ms: u32) -> Option<f32> {
        self.history.average_between(start_ms, end_ms)
    }

    /// Set the tack side after a confirmed crossing
    pub fn set_tack_side(&mut self, side: TackSide) {
        self.tack_side = side;
    }

    /// Re-derive tack side and point of sail from the next sample
    ///
    /// Used when the wind direction is replaced wholesale, so the stored
    /// side does not produce a spurious crossing against the new wind.
    pub fn reinitialize_sides(&mut self) {
        self.sides_initialized = false;
    }

    /// Last smoothed heading, None before the first sample
    pub fn smoothed_heading(&self) -> Option<f32> {
        self.smoothed_heading
    }

    pub fn wind_angle_less_cog(&self) -> f32 {
        self.wind_angle_less_cog
    }

    pub fn previous_wind_angle(&self) -> f32 {
        self.previous_wind_angle
    }

    pub fn tack_side(&self) -> TackSide {
        self.tack_side
    }

    pub fn point_of_sail(&self) -> PointOfSail {
        self.point_of_sail
    }

    pub fn previous_point_of_sail(&self) -> PointOfSail {
        self.previous_point_of_sail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::angles::angle_abs_difference;
    use crate::history::DEFAULT_HEADING_HISTORY_CAPACITY;
    use proptest::prelude::*;

    fn calculator() -> AngleCalculator {
        AngleCalculator::new(DEFAULT_HEADING_ALPHA, DEFAULT_HEADING_HISTORY_CAPACITY)
    }

    #[test]
    fn test_first_sample_seeds_filter() {
        let mut calc = calculator();
        let smoothed = calc.process_heading(135.0, 0, 180.0);
        assert_eq!(smoothed, 135.0);
        assert_eq!(calc.tack_side(), TackSide::Starboard);
        assert_eq!(calc.point_of_sail(), PointOfSail::Upwind);
        assert!((calc.wind_angle_less_cog() - 45.0).abs() < 1e-3);
    }

    #[test]
    fn test_ema_step() {
        let mut calc = calculator();
        calc.process_heading(100.0, 0, 0.0);
        let smoothed = calc.process_heading(120.0, 1000, 0.0);
        assert!((smoothed - 103.0).abs() < 1e-3, "got {}", smoothed);
    }

    #[test]
    fn test_ema_wraps_through_north() {
        let mut calc = calculator();
        calc.process_heading(350.0, 0, 0.0);
        // +30° step across north, not -330°
        let smoothed = calc.process_heading(20.0, 1000, 0.0);
        assert!((smoothed - 354.5).abs() < 1e-3, "got {}", smoothed);

        let mut calc = calculator();
        calc.process_heading(10.0, 0, 0.0);
        let smoothed = calc.process_heading(340.0, 1000, 0.0);
        assert!((smoothed - 5.5).abs() < 1e-3, "got {}", smoothed);
    }

    #[test]
    fn test_input_normalized() {
        let mut calc = calculator();
        let smoothed = calc.process_heading(-90.0, 0, 0.0);
        assert!((smoothed - 270.0).abs() < 1e-3);
        assert!((calc.wind_angle_less_cog() - 90.0).abs() < 1e-3);
        assert_eq!(calc.point_of_sail(), PointOfSail::Downwind);
    }

    #[test]
    fn test_tack_side_not_reinitialized_after_first_sample() {
        let mut calc = AngleCalculator::new(1.0, 60);
        calc.process_heading(135.0, 0, 180.0);
        assert_eq!(calc.tack_side(), TackSide::Starboard);

        // Wind angle goes negative, but only a confirmed crossing flips the side
        calc.process_heading(225.0, 1000, 180.0);
        assert!(calc.wind_angle_less_cog() < 0.0);
        assert_eq!(calc.tack_side(), TackSide::Starboard);

        calc.set_tack_side(TackSide::Port);
        assert_eq!(calc.tack_side(), TackSide::Port);
    }

    #[test]
    fn test_point_of_sail_tracks_every_sample() {
        let mut calc = AngleCalculator::new(1.0, 60);
        calc.process_heading(170.0, 0, 180.0);
        assert_eq!(calc.point_of_sail(), PointOfSail::Upwind);

        calc.process_heading(20.0, 1000, 180.0);
        assert_eq!(calc.point_of_sail(), PointOfSail::Downwind);
        assert_eq!(calc.previous_point_of_sail(), PointOfSail::Upwind);
        assert!((calc.previous_wind_angle() - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_reinitialize_sides_rederives_tack() {
        let mut calc = AngleCalculator::new(1.0, 60);
        calc.process_heading(135.0, 0, 180.0);
        calc.reinitialize_sides();
        calc.process_heading(135.0, 1000, 90.0);
        assert_eq!(calc.tack_side(), TackSide::Port);
    }

    #[test]
    fn test_average_heading_window() {
        let mut calc = AngleCalculator::new(1.0, 60);
        for i in 0..5u32 {
            calc.process_heading(350.0, i * 1000, 0.0);
        }
        for i in 5..10u32 {
            calc.process_heading(10.0, i * 1000, 0.0);
        }
        let all = calc.calculate_average_heading(0, 9000).unwrap();
        assert!(angle_abs_difference(all, 0.0) < 1e-3, "got {}", all);
        assert_eq!(calc.calculate_average_heading(20_000, 30_000), None);
    }

    #[test]
    fn test_wind_angle_range_on_wrap() {
        let mut calc = AngleCalculator::new(1.0, 60);
        calc.process_heading(1.0, 0, 359.0);
        assert!((calc.wind_angle_less_cog() + 2.0).abs() < 1e-3);
        calc.process_heading(359.0, 1000, 1.0);
        assert!((calc.wind_angle_less_cog() - 2.0).abs() < 1e-3);
    }

    proptest! {
        #[test]
        fn prop_outputs_stay_in_range(
            alpha in 0.0f32..=1.0,
            steps in prop::collection::vec((-720.0f32..720.0, 0.0f32..360.0), 1..40),
        ) {
            let mut calc = AngleCalculator::new(alpha, 16);
            for (i, (heading, wind)) in steps.into_iter().enumerate() {
                let smoothed = calc.process_heading(heading, i as u32 * 1000, wind);
                prop_assert!((0.0..360.0).contains(&smoothed), "heading {}", smoothed);
                let angle = calc.wind_angle_less_cog();
                prop_assert!((-180.0..=180.0).contains(&angle), "wind angle {}", angle);
                prop_assert_eq!(calc.point_of_sail(), PointOfSail::from_wind_angle(angle));
            }
        }
    }
}
