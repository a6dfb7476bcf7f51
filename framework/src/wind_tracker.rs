//! Wind-relative navigation pipeline
//!
//! [`WindTracker`] owns the wind-direction state and the four processing
//! stages, and runs them in a fixed order for every position sample:
//!
//! ```text
//! sample ─► AngleCalculator ─► ManeuverDetector ─► VmgCalculator ─► LapTracker
//!                                      │
//!                                      └─► wind candidate ─► update_auto_wind_direction
//! ```
//!
//! Stages never reach back into the tracker. They take the values they
//! need as arguments and return results that the tracker applies, so a
//! wind-direction change always happens after the whole sample has been
//! processed against the old direction.
//!
//! All processing is synchronous and single-threaded. Hosts serialize
//! position callbacks, the optional 1 Hz [`WindTracker::tick`] and lap-mark
//! requests onto one context.

use chrono::{DateTime, Utc};
use log::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::angle_calculator::{AngleCalculator, PointOfSail, TackSide};
use crate::angles::normalize_degrees;
use crate::config::NavConfig;
use crate::geodesic::{GeoPoint, Geodesic, Haversine};
use crate::lap_tracker::{LapFallback, LapRecord, LapSample, LapTracker};
use crate::maneuver::{ManeuverDetector, ManeuverRecord, ManeuverStats, ResolveContext};
use crate::sample::{PositionSample, SampleError};
use crate::snapshot::{LapSnapshot, WindSnapshot};
use crate::vmg::VmgCalculator;

/// Wind-direction estimate and its mode flags
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WindState {
    /// Best current estimate (degrees, [0, 360))
    pub wind_direction: f32,
    /// User-supplied baseline
    pub initial_wind_direction: f32,
    pub auto_detection_active: bool,
    /// Suppresses automatic updates
    pub locked: bool,
}

/// Orchestrates the per-sample pipeline
pub struct WindTracker {
    config: NavConfig,
    wind: WindState,

    angles: AngleCalculator,
    maneuvers: ManeuverDetector,
    vmg: VmgCalculator,
    laps: LapTracker,

    last_speed_kn: f32,
    last_timestamp_ms: Option<u32>,
    last_utc: Option<DateTime<Utc>>,
    last_position: Option<GeoPoint>,
    dropped_samples: u32,
}

impl WindTracker {
    /// Start a session with the user's initial wind direction
    pub fn new(config: NavConfig, initial_wind_direction: f32) -> Self {
        Self::with_geodesic(config, initial_wind_direction, Box::new(Haversine))
    }

    /// Start a session with a host-provided geodesic primitive
    pub fn with_geodesic(
        config: NavConfig,
        initial_wind_direction: f32,
        geodesic: Box<dyn Geodesic>,
    ) -> Self {
        let wind_direction = normalize_degrees(initial_wind_direction);
        info!(
            "Wind tracker started: wind {:.0}, foiling threshold {:.1} kt, auto wind {}",
            wind_direction,
            config.foiling_speed_threshold_kn,
            if config.auto_wind_detection { "on" } else { "off" }
        );
        Self {
            wind: WindState {
                wind_direction,
                initial_wind_direction: wind_direction,
                auto_detection_active: config.auto_wind_detection,
                locked: false,
            },
            angles: AngleCalculator::new(config.heading_alpha, config.heading_history_capacity),
            maneuvers: ManeuverDetector::new(&config),
            vmg: VmgCalculator::new(config.vmg_alpha),
            laps: LapTracker::with_geodesic(config.foiling_speed_threshold_kn, geodesic),
            config,
            last_speed_kn: 0.0,
            last_timestamp_ms: None,
            last_utc: None,
            last_position: None,
            dropped_samples: 0,
        }
    }

    /// Run one GPS fix through the pipeline
    ///
    /// Samples without a usable heading or speed are dropped before any
    /// state changes; the error tells the host why.
    ///
    /// # Example
    /// ```
    /// use sail_nav::{NavConfig, PositionSample, WindTracker};
    ///
    /// let mut tracker = WindTracker::new(NavConfig::default(), 0.0);
    /// // 45° off the wind at 10 m/s, heading in radians
    /// tracker
    ///     .on_position_sample(PositionSample::new(45f32.to_radians(), 10.0, 0))
    ///     .unwrap();
    /// assert!(tracker.current_vmg() > 13.0);
    /// ```
    pub fn on_position_sample(&mut self, sample: PositionSample) -> Result<(), SampleError> {
        let (heading, speed_kn) = match sample.heading_and_speed() {
            Ok(values) => values,
            Err(e) => {
                self.dropped_samples += 1;
                debug!("Sample at t={}ms dropped: {}", sample.timestamp_ms, e);
                return Err(e);
            }
        };
        let now_ms = sample.timestamp_ms;
        self.last_speed_kn = speed_kn;
        self.last_timestamp_ms = Some(now_ms);
        if sample.utc.is_some() {
            self.last_utc = sample.utc;
        }
        if let Some(position) = sample.position.filter(GeoPoint::is_finite) {
            self.last_position = Some(position);
        }

        // Angles
        self.angles
            .process_heading(heading, now_ms, self.wind.wind_direction);

        // Maneuvers
        if let Some(pending) = self.maneuvers.detect_maneuver(&self.angles, speed_kn, now_ms) {
            self.angles.set_tack_side(pending.new_tack);
        }
        let wind_candidate = self.resolve_pending(now_ms);

        // VMG
        let point_of_sail = self.angles.point_of_sail();
        let vmg = self.vmg.calculate_vmg(
            speed_kn,
            point_of_sail.is_upwind(),
            self.angles.wind_angle_less_cog().abs(),
        );

        // Laps
        self.laps.process_data(
            &LapSample {
                position: sample.position,
                speed_kn,
                vmg,
                is_upwind: point_of_sail.is_upwind(),
                wind_direction: self.wind.wind_direction,
            },
            now_ms,
        );

        if let Some(candidate) = wind_candidate {
            self.update_auto_wind_direction(candidate);
        }
        Ok(())
    }

    /// Poll pending maneuver resolution without a new sample (1 Hz timer)
    pub fn tick(&mut self, now_ms: u32) {
        if let Some(candidate) = self.resolve_pending(now_ms) {
            self.update_auto_wind_direction(candidate);
        }
    }

    fn resolve_pending(&mut self, now_ms: u32) -> Option<f32> {
        let outcome = self.maneuvers.check_pending_maneuvers(
            &self.angles,
            now_ms,
            ResolveContext {
                wind_direction: self.wind.wind_direction,
                lap_number: self.laps.current_lap(),
                wall_clock_time: self.last_utc,
            },
        )?;
        self.laps.record_maneuver_in_lap(&outcome.record);
        outcome.wind_candidate
    }

    /// Apply a wind direction inferred from maneuvers
    ///
    /// Ignored while locked or when auto detection is off.
    ///
    /// # Returns
    /// true if the wind direction was updated
    pub fn update_auto_wind_direction(&mut self, candidate: f32) -> bool {
        if !candidate.is_finite() {
            return false;
        }
        if self.wind.locked || !self.wind.auto_detection_active {
            debug!(
                "Wind candidate {:.1} ignored ({})",
                candidate,
                if self.wind.locked { "locked" } else { "auto detection off" }
            );
            return false;
        }
        let candidate = normalize_degrees(candidate);
        info!(
            "Auto wind direction {:.1} -> {:.1}",
            self.wind.wind_direction, candidate
        );
        self.wind.wind_direction = candidate;
        true
    }

    /// Manually set the wind direction, starting a new maneuver epoch
    ///
    /// Counters, maneuver history and pending state are cleared; tack side
    /// and point of sail are re-derived from the next sample.
    pub fn set_initial_wind_direction(&mut self, degrees: f32) {
        if !degrees.is_finite() {
            debug!("Ignoring non-finite wind direction");
            return;
        }
        let degrees = normalize_degrees(degrees);
        self.wind.wind_direction = degrees;
        self.wind.initial_wind_direction = degrees;
        self.wind.auto_detection_active = self.config.auto_wind_detection;
        self.start_epoch();
        info!("Wind direction set to {:.0}", degrees);
    }

    pub fn lock_wind_direction(&mut self) {
        self.wind.locked = true;
        info!("Wind direction locked at {:.1}", self.wind.wind_direction);
    }

    pub fn unlock_wind_direction(&mut self) {
        self.wind.locked = false;
        info!("Wind direction unlocked");
    }

    /// Return to the user-supplied baseline, discarding auto updates
    pub fn reset_to_manual_direction(&mut self) {
        self.wind.wind_direction = self.wind.initial_wind_direction;
        self.wind.auto_detection_active = self.config.auto_wind_detection;
        self.start_epoch();
        info!(
            "Wind direction reset to manual {:.0}",
            self.wind.initial_wind_direction
        );
    }

    fn start_epoch(&mut self) {
        self.maneuvers.reset_counts();
        self.angles.reinitialize_sides();
    }

    /// Start a new lap
    ///
    /// Without an explicit position the most recent fix is used; with
    /// neither, the next fix becomes the lap reference.
    pub fn on_lap_mark_requested(&mut self, position: Option<GeoPoint>, now_ms: u32) -> u32 {
        self.laps.on_lap_marked(position.or(self.last_position), now_ms)
    }

    pub fn wind_snapshot(&self) -> WindSnapshot {
        WindSnapshot {
            wind_direction: self.wind.wind_direction,
            initial_wind_direction: self.wind.initial_wind_direction,
            auto_detection_active: self.wind.auto_detection_active,
            locked: self.wind.locked,
            current_vmg: self.vmg.vmg(),
            tack_count: self.maneuvers.tack_count(),
            gybe_count: self.maneuvers.gybe_count(),
            last_tack_angle: self.maneuvers.last_tack_angle(),
            last_gybe_angle: self.maneuvers.last_gybe_angle(),
            current_tack_side: self.angles.tack_side(),
            current_point_of_sail: self.angles.point_of_sail(),
            wind_angle_less_cog: self.angles.wind_angle_less_cog(),
            maneuver_stats: *self.maneuvers.stats(),
        }
    }

    /// Current lap values, clamped and rounded for recording
    pub fn lap_snapshot(&self, now_ms: u32) -> LapSnapshot {
        let fallback = LapFallback {
            current_vmg: self.vmg.vmg(),
            is_upwind: self.angles.point_of_sail().is_upwind(),
            last_tack_ms: self.maneuvers.last_tack_ms(),
            avg_tack_angle: self.maneuvers.stats().avg_tack_angle,
        };
        self.laps.get_lap_data(now_ms, &fallback)
    }

    pub fn wind_state(&self) -> &WindState {
        &self.wind
    }

    pub fn wind_direction(&self) -> f32 {
        self.wind.wind_direction
    }

    pub fn is_locked(&self) -> bool {
        self.wind.locked
    }

    pub fn tack_count(&self) -> u32 {
        self.maneuvers.tack_count()
    }

    pub fn gybe_count(&self) -> u32 {
        self.maneuvers.gybe_count()
    }

    pub fn last_tack_angle(&self) -> f32 {
        self.maneuvers.last_tack_angle()
    }

    pub fn last_gybe_angle(&self) -> f32 {
        self.maneuvers.last_gybe_angle()
    }

    /// Smoothed VMG (knots)
    pub fn current_vmg(&self) -> f32 {
        self.vmg.vmg()
    }

    /// Speed of the last accepted sample (knots)
    pub fn current_speed_kn(&self) -> f32 {
        self.last_speed_kn
    }

    pub fn tack_side(&self) -> TackSide {
        self.angles.tack_side()
    }

    pub fn point_of_sail(&self) -> PointOfSail {
        self.angles.point_of_sail()
    }

    pub fn wind_angle_less_cog(&self) -> f32 {
        self.angles.wind_angle_less_cog()
    }

    pub fn smoothed_heading(&self) -> Option<f32> {
        self.angles.smoothed_heading()
    }

    pub fn maneuver_stats(&self) -> &ManeuverStats {
        self.maneuvers.stats()
    }

    /// Whether a crossing is waiting for its measurement window
    pub fn has_pending_maneuver(&self) -> bool {
        self.maneuvers.pending().is_some()
    }

    /// Stored tacks and gybes of the current epoch, in time order
    pub fn maneuvers(&self) -> Vec<&ManeuverRecord> {
        let mut all: Vec<&ManeuverRecord> = self
            .maneuvers
            .tack_history()
            .iter()
            .chain(self.maneuvers.gybe_history())
            .collect();
        all.sort_by_key(|r| r.timestamp_ms);
        all
    }

    pub fn current_lap(&self) -> u32 {
        self.laps.current_lap()
    }

    pub fn lap(&self, number: u32) -> Option<&LapRecord> {
        self.laps.lap(number)
    }

    pub fn laps(&self) -> impl Iterator<Item = &LapRecord> {
        self.laps.laps()
    }

    /// Timestamp of the last accepted sample
    pub fn last_timestamp_ms(&self) -> Option<u32> {
        self.last_timestamp_ms
    }

    /// Samples rejected as missing or non-finite
    pub fn dropped_samples(&self) -> u32 {
        self.dropped_samples
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::angles::angle_abs_difference;
    use crate::maneuver::ManeuverKind;
    use crate::testkit::Track;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    /// No heading smoothing so leg headings are exact
    fn exact_config() -> NavConfig {
        NavConfig {
            heading_alpha: 1.0,
            ..Default::default()
        }
    }

    fn feed<'a>(tracker: &mut WindTracker, samples: impl IntoIterator<Item = &'a PositionSample>) {
        for sample in samples {
            tracker.on_position_sample(*sample).unwrap();
        }
    }

    fn feed_range(tracker: &mut WindTracker, samples: &[PositionSample], from_ms: u32, to_ms: u32) {
        feed(
            tracker,
            samples
                .iter()
                .filter(|s| s.timestamp_ms >= from_ms && s.timestamp_ms < to_ms),
        );
    }

    #[test]
    fn test_tack_measured_after_guard_window() {
        // Wind 345: 300 is starboard (+45), 30 is port (-45)
        let mut tracker = WindTracker::new(exact_config(), 345.0);
        let samples = Track::new(10.0).hold(300.0, 13).hold(30.0, 13).samples();

        feed_range(&mut tracker, &samples, 0, 25_000);
        assert_eq!(tracker.tack_side(), TackSide::Port);
        assert!(tracker.has_pending_maneuver());
        assert_eq!(tracker.tack_count(), 0);

        feed_range(&mut tracker, &samples, 25_000, u32::MAX);
        assert_eq!(tracker.tack_count(), 1);
        assert_eq!(tracker.gybe_count(), 0);
        assert!((tracker.last_tack_angle() - 90.0).abs() < 0.01, "got {}", tracker.last_tack_angle());
        assert!(!tracker.has_pending_maneuver());
    }

    #[test]
    fn test_crossing_classified_as_tack_when_upwind_before() {
        // +15 -> -15 with wind 0
        let mut tracker = WindTracker::new(exact_config(), 0.0);
        let samples = Track::new(10.0).hold(345.0, 13).hold(15.0, 13).samples();
        feed(&mut tracker, &samples);

        let snapshot = tracker.wind_snapshot();
        assert_eq!(snapshot.tack_count, 1);
        assert_eq!(snapshot.gybe_count, 0);
        assert_eq!(snapshot.current_point_of_sail, PointOfSail::Upwind);
        assert!((snapshot.last_tack_angle - 30.0).abs() < 0.01);
    }

    #[test]
    fn test_gybe_when_downwind_before() {
        // Wind 0: 135 is port downwind (-135), 225 is starboard downwind (+135)
        let mut tracker = WindTracker::new(exact_config(), 0.0);
        let samples = Track::new(12.0).hold(135.0, 13).hold(225.0, 13).samples();
        feed(&mut tracker, &samples);

        assert_eq!(tracker.gybe_count(), 1);
        assert_eq!(tracker.tack_count(), 0);
        assert!((tracker.last_gybe_angle() - 90.0).abs() < 0.01);
        assert_eq!(tracker.tack_side(), TackSide::Starboard);
        assert_eq!(tracker.point_of_sail(), PointOfSail::Downwind);
    }

    #[test]
    fn test_smoothed_tack_through_the_wind() {
        // Default smoothing: the crossing lags the helm by a few samples
        let config = NavConfig::default();
        let mut tracker = WindTracker::new(config, 180.0);
        let samples = Track::new(8.0).hold(135.0, 24).hold(225.0, 21).samples();
        feed(&mut tracker, &samples);

        assert_eq!(tracker.tack_count(), 1);
        assert_eq!(tracker.tack_side(), TackSide::Port);
        let angle = tracker.last_tack_angle();
        assert!(angle > 50.0 && angle < 90.0, "got {}", angle);
    }

    #[test]
    fn test_too_few_samples_after_crossing() {
        let mut tracker = WindTracker::new(exact_config(), 345.0);
        let samples = Track::new(10.0).hold(300.0, 13).hold(30.0, 5).samples();
        feed(&mut tracker, &samples);
        assert!(tracker.has_pending_maneuver());
        assert_eq!(tracker.tack_count(), 0);

        // Samples stop one second after the crossing; the after-window is empty
        let mut tracker = WindTracker::new(exact_config(), 345.0);
        let samples = Track::new(10.0).hold(300.0, 13).hold(30.0, 2).samples();
        feed(&mut tracker, &samples);
        tracker.tick(40_000);
        assert!(!tracker.has_pending_maneuver());
        assert_eq!(tracker.tack_count(), 0);
        assert_eq!(tracker.gybe_count(), 0);
        assert!(tracker.maneuvers().is_empty());
    }

    #[test]
    fn test_tick_resolves_without_new_sample() {
        let mut tracker = WindTracker::new(exact_config(), 345.0);
        let samples = Track::new(10.0).hold(300.0, 13).hold(30.0, 12).samples();
        feed(&mut tracker, &samples);
        assert_eq!(tracker.tack_count(), 0);

        tracker.tick(24_000);
        assert_eq!(tracker.tack_count(), 0);
        tracker.tick(25_000);
        assert_eq!(tracker.tack_count(), 1);
        assert!((tracker.last_tack_angle() - 90.0).abs() < 0.01);
    }

    #[test]
    fn test_crossing_exactly_at_threshold_is_not_a_tack() {
        // 170 -> 190 with wind 180 lands on exactly -10, which does not cross
        for config in [NavConfig::default(), exact_config()] {
            let mut tracker = WindTracker::new(config, 180.0);
            let samples = Track::new(8.0).hold(170.0, 12).hold(190.0, 24).samples();
            feed(&mut tracker, &samples);
            tracker.tick(60_000);

            assert_eq!(tracker.tack_count(), 0);
            assert_eq!(tracker.last_tack_angle(), 0.0);
            assert_eq!(tracker.tack_side(), TackSide::Starboard);
            assert!(tracker.wind_angle_less_cog() >= -10.0 - 1e-3);
        }
    }

    #[test]
    fn test_shallow_tack_past_threshold() {
        let mut tracker = WindTracker::new(exact_config(), 180.0);
        let samples = Track::new(8.0).hold(168.0, 12).hold(192.0, 24).samples();
        feed(&mut tracker, &samples);

        assert_eq!(tracker.tack_count(), 1);
        assert_eq!(tracker.tack_side(), TackSide::Port);
        assert!((tracker.last_tack_angle() - 24.0).abs() < 0.01, "got {}", tracker.last_tack_angle());
    }

    #[test]
    fn test_below_threshold_never_detects() {
        let mut tracker = WindTracker::new(exact_config(), 345.0);
        let samples = Track::new(5.0).hold(300.0, 13).hold(30.0, 20).samples();
        feed(&mut tracker, &samples);
        assert_eq!(tracker.tack_count(), 0);
        assert!(!tracker.has_pending_maneuver());
        // Side stays as initialized, only the implied side changed
        assert_eq!(tracker.tack_side(), TackSide::Starboard);
    }

    /// Tacks ending on 10° then 350° with a low tack threshold and wind 5
    fn bisector_track() -> Vec<PositionSample> {
        Track::new(10.0)
            .hold(330.0, 13)
            .hold(10.0, 25)
            .hold(350.0, 13)
            .samples()
    }

    fn bisector_config() -> NavConfig {
        NavConfig {
            tack_threshold_deg: 3.0,
            ..exact_config()
        }
    }

    #[test]
    fn test_auto_wind_from_tack_bisector() {
        let mut tracker = WindTracker::new(bisector_config(), 5.0);
        feed(&mut tracker, &bisector_track());

        assert_eq!(tracker.tack_count(), 2);
        let wind = tracker.wind_direction();
        assert!(angle_abs_difference(wind, 0.0) < 0.5, "got {}", wind);
        assert_eq!(tracker.wind_state().initial_wind_direction, 5.0);
    }

    #[test]
    fn test_lock_suppresses_auto_wind() {
        let mut tracker = WindTracker::new(bisector_config(), 5.0);
        tracker.lock_wind_direction();
        feed(&mut tracker, &bisector_track());

        assert_eq!(tracker.tack_count(), 2);
        assert_eq!(tracker.wind_direction(), 5.0);
        assert!(tracker.wind_snapshot().locked);

        tracker.unlock_wind_direction();
        assert!(tracker.update_auto_wind_direction(2.0));
        assert_eq!(tracker.wind_direction(), 2.0);
    }

    #[test]
    fn test_auto_detection_disabled() {
        let config = NavConfig {
            auto_wind_detection: false,
            ..bisector_config()
        };
        let mut tracker = WindTracker::new(config, 5.0);
        feed(&mut tracker, &bisector_track());
        assert_eq!(tracker.tack_count(), 2);
        assert_eq!(tracker.wind_direction(), 5.0);
        assert!(!tracker.update_auto_wind_direction(0.0));
    }

    #[test]
    fn test_manual_set_starts_new_epoch() {
        let mut tracker = WindTracker::new(exact_config(), 345.0);
        feed(&mut tracker, &Track::new(10.0).hold(300.0, 13).hold(30.0, 13).samples());
        assert_eq!(tracker.tack_count(), 1);

        tracker.set_initial_wind_direction(-90.0);
        let snapshot = tracker.wind_snapshot();
        assert_eq!(snapshot.wind_direction, 270.0);
        assert_eq!(snapshot.initial_wind_direction, 270.0);
        assert_eq!(snapshot.tack_count, 0);
        assert_eq!(snapshot.last_tack_angle, 0.0);
        assert_eq!(snapshot.maneuver_stats, ManeuverStats::default());
        assert!(tracker.maneuvers().is_empty());
    }

    #[test]
    fn test_manual_set_rederives_sides() {
        let mut tracker = WindTracker::new(exact_config(), 345.0);
        feed(&mut tracker, &Track::new(10.0).hold(300.0, 5).samples());
        assert_eq!(tracker.tack_side(), TackSide::Starboard);

        // 300 is port of a 250 wind; no crossing should be reported
        tracker.set_initial_wind_direction(250.0);
        tracker
            .on_position_sample(PositionSample::new(300f32.to_radians(), 5.0, 5_000))
            .unwrap();
        assert_eq!(tracker.tack_side(), TackSide::Port);
        assert!(!tracker.has_pending_maneuver());
    }

    #[test]
    fn test_reset_to_manual_direction() {
        let mut tracker = WindTracker::new(bisector_config(), 5.0);
        feed(&mut tracker, &bisector_track());
        assert!(tracker.wind_direction() != 5.0);

        tracker.reset_to_manual_direction();
        assert_eq!(tracker.wind_direction(), 5.0);
        assert_eq!(tracker.tack_count(), 0);
    }

    #[test]
    fn test_malformed_samples_leave_state_untouched() {
        let mut tracker = WindTracker::new(exact_config(), 345.0);
        tracker.on_lap_mark_requested(None, 0);

        let bad = [
            PositionSample {
                heading: None,
                ..PositionSample::new(0.0, 5.0, 1000)
            },
            PositionSample {
                speed_mps: None,
                ..PositionSample::new(1.0, 5.0, 2000)
            },
            PositionSample::new(f32::NAN, 5.0, 3000),
            PositionSample::new(1.0, f32::NEG_INFINITY, 4000),
        ];
        for sample in bad {
            assert!(tracker.on_position_sample(sample).is_err());
        }

        assert_eq!(tracker.dropped_samples(), 4);
        assert_eq!(tracker.smoothed_heading(), None);
        assert_eq!(tracker.last_timestamp_ms(), None);
        assert_eq!(tracker.current_vmg(), 0.0);
        assert_eq!(tracker.tack_count(), 0);
        assert_eq!(tracker.gybe_count(), 0);
        assert_eq!(tracker.lap(1).unwrap().total_points, 0);
    }

    #[test]
    fn test_overflowing_heading_dropped() {
        let mut tracker = WindTracker::new(exact_config(), 345.0);
        tracker.on_position_sample(PositionSample::new(1.0, 5.0, 0)).unwrap();
        let heading = tracker.smoothed_heading();
        let wind_angle = tracker.wind_angle_less_cog();

        let result = tracker.on_position_sample(PositionSample::new(-3.0e38, 5.0, 1000));
        assert_eq!(result, Err(SampleError::NonFinite("heading")));
        assert_eq!(tracker.dropped_samples(), 1);
        assert_eq!(tracker.smoothed_heading(), heading);
        assert_eq!(tracker.wind_angle_less_cog(), wind_angle);
        assert_eq!(tracker.last_timestamp_ms(), Some(0));

        tracker.on_position_sample(PositionSample::new(1.0, 5.0, 2000)).unwrap();
        assert!(tracker.smoothed_heading().is_some_and(|h| h.is_finite()));
        assert!(tracker.wind_angle_less_cog().is_finite());
    }

    #[test]
    fn test_laps_isolated_and_sum_to_global() {
        let mut tracker = WindTracker::new(exact_config(), 345.0);
        let samples = Track::new(10.0)
            .hold(300.0, 13)
            .hold(30.0, 26)
            .hold(300.0, 13)
            .samples();

        tracker.on_lap_mark_requested(None, 0);
        feed_range(&mut tracker, &samples, 0, 26_000);
        let lap1 = tracker.lap(1).unwrap().clone();
        assert_eq!(lap1.stats.maneuvers.tack_count, 1);

        assert_eq!(tracker.on_lap_mark_requested(None, 26_000), 2);
        feed_range(&mut tracker, &samples, 26_000, u32::MAX);

        let lap2 = tracker.lap(2).unwrap();
        assert_eq!(lap2.stats.maneuvers.tack_count, 1);
        assert_eq!(lap2.tacks[0].lap_number, 2);
        assert_eq!(tracker.lap(1).unwrap(), &lap1);
        assert_eq!(
            lap1.stats.maneuvers.tack_count + lap2.stats.maneuvers.tack_count,
            tracker.tack_count()
        );
        assert_eq!(tracker.maneuvers().len(), 2);
        assert!(tracker.maneuvers()[0].timestamp_ms < tracker.maneuvers()[1].timestamp_ms);
    }

    #[test]
    fn test_lap_snapshot_foiling_and_vmg() {
        let mut tracker = WindTracker::new(exact_config(), 0.0);
        tracker.on_lap_mark_requested(None, 0);

        // 60° off the wind: VMG = speed / 2
        let samples = Track::new(10.0).hold(60.0, 3).speed(4.0).hold(60.0, 1).samples();
        feed(&mut tracker, &samples);

        let snapshot = tracker.lap_snapshot(4_000);
        assert_eq!(snapshot.percent_on_foil, 75);
        assert_eq!(snapshot.vmg_down, 0.0);
        assert!(snapshot.vmg_up > 4.0 && snapshot.vmg_up <= 5.0, "got {}", snapshot.vmg_up);
    }

    #[test]
    fn test_lap_snapshot_without_lap_uses_globals() {
        let mut tracker = WindTracker::new(exact_config(), 345.0);
        feed(&mut tracker, &Track::new(10.0).hold(300.0, 13).hold(30.0, 13).samples());

        let snapshot = tracker.lap_snapshot(30_000);
        assert_eq!(snapshot.avg_tack_angle, 90);
        // Crossing at t=13s
        assert_eq!(snapshot.seconds_since_last_tack, 17.0);
        assert_eq!(snapshot.percent_on_foil, 100);
        assert_eq!(snapshot.lap_distance_m, 0.0);
    }

    #[test]
    fn test_record_carries_wall_clock_time() {
        let mut tracker = WindTracker::new(exact_config(), 345.0);
        let utc = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let samples: Vec<_> = Track::new(10.0)
            .hold(300.0, 13)
            .hold(30.0, 13)
            .samples()
            .into_iter()
            .map(|s| s.with_utc(utc))
            .collect();
        feed(&mut tracker, &samples);

        let records = tracker.maneuvers();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ManeuverKind::Tack);
        assert_eq!(records[0].wall_clock_time, Some(utc));
        assert_eq!(records[0].timestamp_ms, 13_000);
        assert_eq!(records[0].lap_number, 0);
    }

    #[test]
    fn test_lap_mark_uses_last_position() {
        let mut tracker = WindTracker::new(exact_config(), 0.0);
        let here = GeoPoint::new(50.0, -1.0);
        tracker
            .on_position_sample(PositionSample::new(1.0, 5.0, 0).with_position(here))
            .unwrap();
        tracker.on_lap_mark_requested(None, 1000);
        assert_eq!(tracker.lap(1).unwrap().start_position, Some(here));
    }
}
