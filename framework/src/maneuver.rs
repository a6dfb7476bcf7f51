//! Tack and gybe detection with delayed angle measurement
//!
//! A maneuver is detected the instant the wind angle crosses to the other
//! side of the boat, but its turning angle is measured later: heading keeps
//! settling after the helm goes over, so the detector waits
//! `measure + ignore` seconds and then compares two windowed circular means
//! of the heading history:
//!
//! ```text
//!   before = mean[t - (M+I), t - I]      after = mean[t + I, t + I + M]
//!   ───────────────|·····|──────|·····|────────────────
//!                     ignore  t  ignore
//! ```
//!
//! Resolution is polled on every sample, so latency equals the sample
//! period. If either window is empty the maneuver is dropped without being
//! counted.
//!
//! ## Classification
//!
//! The crossing rules (±10° for tacks, ±170° downwind for gybes) only say
//! *that* the wind changed sides. Whether it was a tack or a gybe is taken
//! from the point of sail on the sample *before* the crossing and is never
//! revisited.

use chrono::{DateTime, Utc};
use log::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::angle_calculator::{AngleCalculator, TackSide};
use crate::angles::{angle_abs_difference, bisector_angle, normalize_degrees};
use crate::config::NavConfig;

/// Default stored maneuvers per type
pub const DEFAULT_MANEUVER_HISTORY_CAPACITY: usize = 100;

/// Tack or gybe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ManeuverKind {
    Tack,
    Gybe,
}

impl ManeuverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManeuverKind::Tack => "TACK",
            ManeuverKind::Gybe => "GYBE",
        }
    }
}

/// A detected crossing waiting for its measurement windows to fill
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingManeuver {
    pub kind: ManeuverKind,
    pub detected_at_ms: u32,
    pub wind_angle_before: f32,
    pub old_tack: TackSide,
    pub new_tack: TackSide,
}

/// A measured maneuver
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ManeuverRecord {
    pub kind: ManeuverKind,
    /// Settled heading after the maneuver (degrees)
    pub resulting_heading: f32,
    /// Turning angle, before vs after (degrees, 0-180)
    pub angle: f32,
    /// UTC time of the sample that resolved the maneuver, if the source had one
    pub wall_clock_time: Option<DateTime<Utc>>,
    /// Monotonic time of the crossing (milliseconds)
    pub timestamp_ms: u32,
    /// Lap active when resolved (0 = before the first lap mark)
    pub lap_number: u32,
}

impl ManeuverRecord {
    pub fn is_tack(&self) -> bool {
        self.kind == ManeuverKind::Tack
    }
}

/// Count / average / max over a set of maneuvers
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ManeuverStats {
    pub tack_count: u32,
    pub gybe_count: u32,
    pub avg_tack_angle: f32,
    pub avg_gybe_angle: f32,
    pub max_tack_angle: f32,
    pub max_gybe_angle: f32,
}

impl ManeuverStats {
    /// Compute statistics over stored tack and gybe records
    pub fn from_records(tacks: &[ManeuverRecord], gybes: &[ManeuverRecord]) -> Self {
        let (tack_count, avg_tack_angle, max_tack_angle) = summarize(tacks);
        let (gybe_count, avg_gybe_angle, max_gybe_angle) = summarize(gybes);
        Self {
            tack_count,
            gybe_count,
            avg_tack_angle,
            avg_gybe_angle,
            max_tack_angle,
            max_gybe_angle,
        }
    }
}

fn summarize(records: &[ManeuverRecord]) -> (u32, f32, f32) {
    if records.is_empty() {
        return (0, 0.0, 0.0);
    }
    let sum: f32 = records.iter().map(|r| r.angle).sum();
    let max = records.iter().map(|r| r.angle).fold(0.0, f32::max);
    (records.len() as u32, sum / records.len() as f32, max)
}

/// Rolling `[previous, current]` pair of post-maneuver headings
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeadingPair {
    previous: Option<f32>,
    current: Option<f32>,
}

impl HeadingPair {
    pub fn push(&mut self, heading: f32) {
        self.previous = self.current;
        self.current = Some(heading);
    }

    /// Both headings once two maneuvers of this type have resolved
    pub fn both(&self) -> Option<(f32, f32)> {
        Some((self.previous?, self.current?))
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Values the detector needs from its owner when resolving
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext {
    pub wind_direction: f32,
    pub lap_number: u32,
    pub wall_clock_time: Option<DateTime<Utc>>,
}

/// Result of a successful resolution, applied by the owner
#[derive(Debug, Clone, PartialEq)]
pub struct ManeuverOutcome {
    pub record: ManeuverRecord,
    /// Wind direction implied by the last two maneuvers of this type
    pub wind_candidate: Option<f32>,
}

/// Turns the wind-angle stream into measured tacks and gybes
#[derive(Debug, Clone)]
pub struct ManeuverDetector {
    speed_threshold_kn: f32,
    tack_threshold: f32,
    gybe_threshold: f32,
    guard_window_ms: u32,
    ignore_window_ms: u32,
    wind_flip_threshold: f32,
    history_capacity: usize,

    pending: Option<PendingManeuver>,

    tack_count: u32,
    gybe_count: u32,
    last_tack_angle: f32,
    last_gybe_angle: f32,
    last_tack_ms: Option<u32>,

    tack_headings: HeadingPair,
    gybe_headings: HeadingPair,

    tack_history: Vec<ManeuverRecord>,
    gybe_history: Vec<ManeuverRecord>,
    stats: ManeuverStats,
}

impl ManeuverDetector {
    pub fn new(config: &NavConfig) -> Self {
        Self {
            speed_threshold_kn: config.foiling_speed_threshold_kn,
            tack_threshold: config.tack_threshold_deg,
            gybe_threshold: config.gybe_threshold_deg,
            guard_window_ms: config.guard_window_ms(),
            ignore_window_ms: config.ignore_window_ms(),
            wind_flip_threshold: config.wind_flip_threshold_deg,
            history_capacity: config.maneuver_history_capacity,
            pending: None,
            tack_count: 0,
            gybe_count: 0,
            last_tack_angle: 0.0,
            last_gybe_angle: 0.0,
            last_tack_ms: None,
            tack_headings: HeadingPair::default(),
            gybe_headings: HeadingPair::default(),
            tack_history: Vec::new(),
            gybe_history: Vec::new(),
            stats: ManeuverStats::default(),
        }
    }

    /// Check the latest angle state for a tack or gybe crossing
    ///
    /// Only runs at or above the speed threshold. A crossing replaces any
    /// unresolved pending maneuver. The caller must apply the returned
    /// `new_tack` to the angle calculator.
    ///
    /// # Arguments
    /// * `angles` - Angle state after processing the current sample
    /// * `speed_kn` - Current speed (knots)
    /// * `now_ms` - Current monotonic timestamp
    pub fn detect_maneuver(
        &mut self,
        angles: &AngleCalculator,
        speed_kn: f32,
        now_ms: u32,
    ) -> Option<PendingManeuver> {
        if speed_kn < self.speed_threshold_kn {
            return None;
        }

        let angle = angles.wind_angle_less_cog();
        let downwind = !angles.point_of_sail().is_upwind();
        let old_tack = angles.tack_side();

        let (tack_crossing, gybe_crossing) = match old_tack {
            TackSide::Starboard => (
                angle < -self.tack_threshold,
                angle < -self.gybe_threshold && downwind,
            ),
            TackSide::Port => (
                angle > self.tack_threshold,
                angle > self.gybe_threshold && downwind,
            ),
        };
        if !tack_crossing && !gybe_crossing {
            return None;
        }

        // The crossing rule is only a coarse signal; the point of sail
        // before the crossing decides the kind.
        let kind = if angles.previous_point_of_sail().is_upwind() {
            ManeuverKind::Tack
        } else {
            ManeuverKind::Gybe
        };
        let naive = if gybe_crossing {
            ManeuverKind::Gybe
        } else {
            ManeuverKind::Tack
        };
        if naive != kind {
            debug!("Crossing reclassified {} -> {}", naive.as_str(), kind.as_str());
        }

        if let Some(replaced) = self.pending {
            debug!(
                "Pending {} from t={}ms replaced before resolution",
                replaced.kind.as_str(),
                replaced.detected_at_ms
            );
        }

        let pending = PendingManeuver {
            kind,
            detected_at_ms: now_ms,
            wind_angle_before: angles.previous_wind_angle(),
            old_tack,
            new_tack: old_tack.opposite(),
        };
        debug!(
            "{} crossing at t={}ms: wind_angle {:.1} -> {:.1}, {} -> {}",
            kind.as_str(),
            now_ms,
            pending.wind_angle_before,
            angle,
            old_tack.as_str(),
            pending.new_tack.as_str()
        );
        self.pending = Some(pending);
        Some(pending)
    }

    /// Resolve the pending maneuver once its guard window has elapsed
    ///
    /// Returns None while waiting, when nothing is pending, or when either
    /// measurement window has no heading samples (the maneuver is dropped).
    pub fn check_pending_maneuvers(
        &mut self,
        angles: &AngleCalculator,
        now_ms: u32,
        context: ResolveContext,
    ) -> Option<ManeuverOutcome> {
        let pending = self.pending?;
        if now_ms.saturating_sub(pending.detected_at_ms) < self.guard_window_ms {
            return None;
        }
        self.pending = None;

        let t = pending.detected_at_ms;
        let before = angles.calculate_average_heading(
            t.saturating_sub(self.guard_window_ms),
            t.saturating_sub(self.ignore_window_ms),
        );
        let after = angles.calculate_average_heading(
            t.saturating_add(self.ignore_window_ms),
            t.saturating_add(self.guard_window_ms),
        );
        let (Some(before), Some(after)) = (before, after) else {
            debug!(
                "{} at t={}ms dropped: insufficient heading history (before={:?}, after={:?})",
                pending.kind.as_str(),
                t,
                before,
                after
            );
            return None;
        };

        let angle = angle_abs_difference(before, after);
        let record = ManeuverRecord {
            kind: pending.kind,
            resulting_heading: after,
            angle,
            wall_clock_time: context.wall_clock_time,
            timestamp_ms: t,
            lap_number: context.lap_number,
        };

        let (count, headings) = match pending.kind {
            ManeuverKind::Tack => {
                self.tack_count += 1;
                self.last_tack_angle = angle;
                self.last_tack_ms = Some(t);
                (self.tack_count, &mut self.tack_headings)
            }
            ManeuverKind::Gybe => {
                self.gybe_count += 1;
                self.last_gybe_angle = angle;
                (self.gybe_count, &mut self.gybe_headings)
            }
        };
        headings.push(after);
        let pair = headings.both();

        self.store(count, record.clone());
        self.stats = ManeuverStats::from_records(&self.tack_history, &self.gybe_history);

        info!(
            "{} #{} resolved: {:.0}° ({:.0} -> {:.0}), lap {}",
            pending.kind.as_str(),
            count,
            angle,
            before,
            after,
            context.lap_number
        );

        let wind_candidate =
            pair.map(|(previous, current)| self.infer_wind(pending.kind, previous, current, context.wind_direction));

        Some(ManeuverOutcome {
            record,
            wind_candidate,
        })
    }

    /// Wind direction implied by two consecutive same-type maneuvers
    fn infer_wind(&self, kind: ManeuverKind, previous: f32, current: f32, wind_direction: f32) -> f32 {
        let mut candidate = bisector_angle(previous, current);
        if kind == ManeuverKind::Gybe {
            // Gybe headings bracket the downwind axis
            candidate = normalize_degrees(candidate + 180.0);
        }
        if angle_abs_difference(candidate, wind_direction) > self.wind_flip_threshold {
            candidate = normalize_degrees(candidate + 180.0);
        }
        debug!(
            "Wind candidate {:.1} from {} headings {:.1}/{:.1}",
            candidate,
            kind.as_str(),
            previous,
            current
        );
        candidate
    }

    /// Store at index `count - 1`; past capacity is a silent no-op
    fn store(&mut self, count: u32, record: ManeuverRecord) {
        let history = match record.kind {
            ManeuverKind::Tack => &mut self.tack_history,
            ManeuverKind::Gybe => &mut self.gybe_history,
        };
        let index = count as usize - 1;
        if index < history.len() {
            history[index] = record;
        } else if index < self.history_capacity {
            history.push(record);
        }
    }

    /// Start a new wind-direction epoch
    ///
    /// Clears counters, last angles, heading pairs, the stored history and
    /// any pending maneuver.
    pub fn reset_counts(&mut self) {
        self.pending = None;
        self.tack_count = 0;
        self.gybe_count = 0;
        self.last_tack_angle = 0.0;
        self.last_gybe_angle = 0.0;
        self.last_tack_ms = None;
        self.tack_headings.clear();
        self.gybe_headings.clear();
        self.tack_history.clear();
        self.gybe_history.clear();
        self.stats = ManeuverStats::default();
    }

    pub fn pending(&self) -> Option<&PendingManeuver> {
        self.pending.as_ref()
    }

    pub fn tack_count(&self) -> u32 {
        self.tack_count
    }

    pub fn gybe_count(&self) -> u32 {
        self.gybe_count
    }

    pub fn last_tack_angle(&self) -> f32 {
        self.last_tack_angle
    }

    pub fn last_gybe_angle(&self) -> f32 {
        self.last_gybe_angle
    }

    /// Crossing time of the last resolved tack
    pub fn last_tack_ms(&self) -> Option<u32> {
        self.last_tack_ms
    }

    pub fn stats(&self) -> &ManeuverStats {
        &self.stats
    }

    pub fn tack_history(&self) -> &[ManeuverRecord] {
        &self.tack_history
    }

    pub fn gybe_history(&self) -> &[ManeuverRecord] {
        &self.gybe_history
    }
}
