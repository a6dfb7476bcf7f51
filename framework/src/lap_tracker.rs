//! Per-lap statistics
//!
//! A lap starts on an external lap-mark (button press) and runs until the
//! next one. Each lap keeps its own foiling ratio, upwind/downwind VMG
//! averages, tack/gybe lists with statistics, straight-line distance from
//! the lap start and VMG over ground. Lap statistics are independent of
//! the global maneuver statistics; both are maintained.
//!
//! ## Lap VMG over ground
//!
//! ```text
//! made_good = distance(start, here) · cos(bearing(start, here) − wind)
//! lap_vmg   = ±made_good [nm] / elapsed [h]
//! ```
//!
//! The sign follows the point of sail, so progress toward the wind when
//! upwind and away from it when downwind are both positive.
//!
//! Lap 0 means "no lap started yet"; per-lap processing is a no-op until
//! the first mark. Laps are never removed.

use std::collections::BTreeMap;

use log::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geodesic::{distance_and_bearing_with_fallback, GeoPoint, Geodesic, Haversine, METERS_PER_NM};
use crate::maneuver::{ManeuverKind, ManeuverRecord, ManeuverStats};
use crate::snapshot::{
    clamp_round1, clamp_round_int, LapSnapshot, MAX_LAP_DISTANCE_M, MAX_SECONDS, MAX_SPEED_KN,
};

/// Minimum elapsed lap time before lap VMG is computed (hours, ~0.36 s)
pub const MIN_LAP_ELAPSED_HOURS: f64 = 0.0001;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Statistics of one lap
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LapStats {
    pub maneuvers: ManeuverStats,
    /// VMG over ground since the lap start (knots, signed)
    pub lap_vmg: f32,
    pub pct_on_foil: f32,
    pub avg_vmg_up: f32,
    pub avg_vmg_down: f32,
}

/// Everything recorded for one lap
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LapRecord {
    pub number: u32,
    pub start_position: Option<GeoPoint>,
    pub start_timestamp_ms: u32,
    pub distance_meters: f64,
    pub tacks: Vec<ManeuverRecord>,
    pub gybes: Vec<ManeuverRecord>,
    pub stats: LapStats,
    pub foiling_points: u32,
    pub total_points: u32,
    pub vmg_up_total: f32,
    pub vmg_up_points: u32,
    pub vmg_down_total: f32,
    pub vmg_down_points: u32,
    /// Crossing time of the last tack in this lap
    pub last_tack_ms: Option<u32>,
}

impl LapRecord {
    fn new(number: u32, start_position: Option<GeoPoint>, start_timestamp_ms: u32) -> Self {
        Self {
            number,
            start_position,
            start_timestamp_ms,
            distance_meters: 0.0,
            tacks: Vec::new(),
            gybes: Vec::new(),
            stats: LapStats::default(),
            foiling_points: 0,
            total_points: 0,
            vmg_up_total: 0.0,
            vmg_up_points: 0,
            vmg_down_total: 0.0,
            vmg_down_points: 0,
            last_tack_ms: None,
        }
    }
}

/// One processed sample as the lap tracker sees it
#[derive(Debug, Clone, Copy)]
pub struct LapSample {
    pub position: Option<GeoPoint>,
    pub speed_kn: f32,
    pub vmg: f32,
    pub is_upwind: bool,
    pub wind_direction: f32,
}

/// Global values used when the current lap has no data of its own
#[derive(Debug, Clone, Copy, Default)]
pub struct LapFallback {
    pub current_vmg: f32,
    pub is_upwind: bool,
    pub last_tack_ms: Option<u32>,
    pub avg_tack_angle: f32,
}

/// Lap-mark driven aggregation
pub struct LapTracker {
    laps: BTreeMap<u32, LapRecord>,
    current_lap: u32,
    foiling_threshold_kn: f32,
    geodesic: Box<dyn Geodesic>,
    /// Session-wide foiling counters (fallback when no lap is active)
    session_foiling_points: u32,
    session_total_points: u32,
}

impl LapTracker {
    /// Create a tracker using great-circle geometry
    pub fn new(foiling_threshold_kn: f32) -> Self {
        Self::with_geodesic(foiling_threshold_kn, Box::new(Haversine))
    }

    /// Create a tracker with a host-provided geodesic primitive
    ///
    /// Failures of the primitive fall back to the planar approximation.
    pub fn with_geodesic(foiling_threshold_kn: f32, geodesic: Box<dyn Geodesic>) -> Self {
        Self {
            laps: BTreeMap::new(),
            current_lap: 0,
            foiling_threshold_kn,
            geodesic,
            session_foiling_points: 0,
            session_total_points: 0,
        }
    }

    /// Start a new lap
    ///
    /// # Arguments
    /// * `position` - Lap reference point; when None, the next sample with a
    ///   position becomes the reference
    /// * `now_ms` - Lap start time
    ///
    /// # Returns
    /// The new 1-based lap number
    pub fn on_lap_marked(&mut self, position: Option<GeoPoint>, now_ms: u32) -> u32 {
        self.current_lap += 1;
        let position = position.filter(GeoPoint::is_finite);
        self.laps
            .insert(self.current_lap, LapRecord::new(self.current_lap, position, now_ms));
        info!(
            "Lap {} started at t={}ms{}",
            self.current_lap,
            now_ms,
            if position.is_some() { "" } else { " (no position yet)" }
        );
        self.current_lap
    }

    /// Accumulate one sample into the session and the current lap
    pub fn process_data(&mut self, sample: &LapSample, now_ms: u32) {
        let foiling = sample.speed_kn >= self.foiling_threshold_kn;
        self.session_total_points += 1;
        if foiling {
            self.session_foiling_points += 1;
        }

        let Some(lap) = self.laps.get_mut(&self.current_lap) else {
            return;
        };

        // Foiling ratio
        lap.total_points += 1;
        if foiling {
            lap.foiling_points += 1;
        }
        lap.stats.pct_on_foil = lap.foiling_points as f32 * 100.0 / lap.total_points as f32;

        // Running VMG averages (moving samples only)
        if sample.vmg > 0.0 {
            if sample.is_upwind {
                lap.vmg_up_total += sample.vmg;
                lap.vmg_up_points += 1;
                lap.stats.avg_vmg_up = lap.vmg_up_total / lap.vmg_up_points as f32;
            } else {
                lap.vmg_down_total += sample.vmg;
                lap.vmg_down_points += 1;
                lap.stats.avg_vmg_down = lap.vmg_down_total / lap.vmg_down_points as f32;
            }
        }

        // Distance and VMG over ground from the lap start
        let Some(position) = sample.position.filter(GeoPoint::is_finite) else {
            return;
        };
        let Some(start) = lap.start_position else {
            debug!("Lap {} reference set from first position", lap.number);
            lap.start_position = Some(position);
            return;
        };
        let Some((distance, bearing)) =
            distance_and_bearing_with_fallback(self.geodesic.as_ref(), start, position)
        else {
            return;
        };
        lap.distance_meters = distance;

        let elapsed_hours = now_ms.saturating_sub(lap.start_timestamp_ms) as f64 / MS_PER_HOUR;
        if elapsed_hours < MIN_LAP_ELAPSED_HOURS {
            return;
        }

        let mut made_good = distance * (bearing - sample.wind_direction as f64).to_radians().cos();
        if !sample.is_upwind {
            made_good = -made_good;
        }
        lap.stats.lap_vmg = ((made_good / METERS_PER_NM) / elapsed_hours) as f32;
    }

    /// Add a resolved maneuver to the current lap, if one is active
    pub fn record_maneuver_in_lap(&mut self, record: &ManeuverRecord) {
        let Some(lap) = self.laps.get_mut(&self.current_lap) else {
            return;
        };
        match record.kind {
            ManeuverKind::Tack => {
                lap.tacks.push(record.clone());
                lap.last_tack_ms = Some(record.timestamp_ms);
            }
            ManeuverKind::Gybe => lap.gybes.push(record.clone()),
        }
        lap.stats.maneuvers = ManeuverStats::from_records(&lap.tacks, &lap.gybes);
        debug!(
            "Lap {}: {} tacks, {} gybes",
            lap.number, lap.stats.maneuvers.tack_count, lap.stats.maneuvers.gybe_count
        );
    }

    /// Lap values for display/recording
    ///
    /// Prefers current-lap values, falling back to the global ones when no
    /// lap is active or the lap has no data for a field.
    pub fn get_lap_data(&self, now_ms: u32, fallback: &LapFallback) -> LapSnapshot {
        let lap = self.current();

        let vmg_up = lap
            .filter(|l| l.vmg_up_points > 0)
            .map(|l| l.stats.avg_vmg_up)
            .unwrap_or(if fallback.is_upwind { fallback.current_vmg } else { 0.0 });
        let vmg_down = lap
            .filter(|l| l.vmg_down_points > 0)
            .map(|l| l.stats.avg_vmg_down)
            .unwrap_or(if fallback.is_upwind { 0.0 } else { fallback.current_vmg });

        let seconds_since_last_tack = lap
            .and_then(|l| l.last_tack_ms)
            .or(fallback.last_tack_ms)
            .map(|t| now_ms.saturating_sub(t) as f32 / 1000.0)
            .unwrap_or(0.0);

        let avg_tack_angle = lap
            .filter(|l| l.stats.maneuvers.tack_count > 0)
            .map(|l| l.stats.maneuvers.avg_tack_angle)
            .unwrap_or(fallback.avg_tack_angle);

        let percent_on_foil = match lap.filter(|l| l.total_points > 0) {
            Some(l) => l.stats.pct_on_foil,
            None => self.session_percent_on_foil(),
        };

        LapSnapshot {
            vmg_up: clamp_round1(vmg_up, MAX_SPEED_KN),
            vmg_down: clamp_round1(vmg_down, MAX_SPEED_KN),
            seconds_since_last_tack: clamp_round1(seconds_since_last_tack, MAX_SECONDS),
            lap_distance_m: clamp_round1(
                lap.map(|l| l.distance_meters as f32).unwrap_or(0.0),
                MAX_LAP_DISTANCE_M,
            ),
            avg_tack_angle: clamp_round_int(avg_tack_angle, 180.0) as u16,
            cumulative_lap_vmg: clamp_round1(lap.map(|l| l.stats.lap_vmg).unwrap_or(0.0), MAX_SPEED_KN),
            percent_on_foil: clamp_round_int(percent_on_foil, 100.0) as u8,
        }
    }

    /// Foiling percentage over the whole session
    pub fn session_percent_on_foil(&self) -> f32 {
        if self.session_total_points == 0 {
            return 0.0;
        }
        self.session_foiling_points as f32 * 100.0 / self.session_total_points as f32
    }

    /// Current lap number (0 before the first mark)
    pub fn current_lap(&self) -> u32 {
        self.current_lap
    }

    /// The active lap, if any
    pub fn current(&self) -> Option<&LapRecord> {
        self.laps.get(&self.current_lap)
    }

    pub fn lap(&self, number: u32) -> Option<&LapRecord> {
        self.laps.get(&number)
    }

    /// All laps in order
    pub fn laps(&self) -> impl Iterator<Item = &LapRecord> {
        self.laps.values()
    }
}
