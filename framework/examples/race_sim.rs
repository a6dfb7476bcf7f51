//! Simulates a windward/leeward race to exercise the navigation pipeline
//!
//! Scenario: START → BEAT (two tacks) → WINDWARD MARK → RUN (one gybe) → FINISH
//!
//! The wind blows from 200°, but the sailor enters 185° at the start. The
//! tacks on the beat give the engine a heading pair to infer the real
//! wind from.
//!
//! Run with: cargo run -p sail-nav --example race_sim

use sail_nav::geodesic::METERS_PER_DEGREE_LAT;
use sail_nav::sample::MPS_TO_KNOTS;
use sail_nav::{GeoPoint, NavConfig, PositionSample, WindTracker};

const TRUE_WIND: f32 = 200.0;

/// Simple pseudo-random noise generator (deterministic for reproducibility)
struct NoiseGen {
    state: u32,
}

impl NoiseGen {
    fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Returns noise in range [-amplitude, +amplitude]
    fn next(&mut self, amplitude: f32) -> f32 {
        self.state = self.state.wrapping_mul(1103515245).wrapping_add(12345);
        let normalized = (self.state as f32 / u32::MAX as f32) * 2.0 - 1.0;
        normalized * amplitude
    }
}

/// Boat moving at 1 Hz over a flat patch of water
struct Boat {
    t_ms: u32,
    position: GeoPoint,
}

impl Boat {
    /// Advance one second and return the GPS fix
    fn step(&mut self, course_deg: f32, speed_kn: f32) -> PositionSample {
        let speed_mps = speed_kn / MPS_TO_KNOTS;
        let course = (course_deg as f64).to_radians();
        let north = speed_mps as f64 * course.cos();
        let east = speed_mps as f64 * course.sin();
        self.position.lat += north / METERS_PER_DEGREE_LAT;
        self.position.lon += east / (METERS_PER_DEGREE_LAT * self.position.lat.to_radians().cos());
        self.t_ms += 1000;

        PositionSample::new(course_deg.rem_euclid(360.0).to_radians(), speed_mps, self.t_ms)
            .with_position(self.position)
    }
}

fn sail(
    tracker: &mut WindTracker,
    boat: &mut Boat,
    noise: &mut NoiseGen,
    course: f32,
    speed_kn: f32,
    seconds: u32,
) {
    for _ in 0..seconds {
        let sample = boat.step(course + noise.next(3.0), speed_kn + noise.next(0.5));
        if let Err(e) = tracker.on_position_sample(sample) {
            println!("  dropped sample: {}", e);
        }
    }
}

fn report(tracker: &WindTracker, label: &str) {
    let wind = tracker.wind_snapshot();
    println!(
        "  [{}] wind={:.0}° tacks={} gybes={} last_tack={:.0}° last_gybe={:.0}° vmg={:.1} kn {} {}",
        label,
        wind.wind_direction,
        wind.tack_count,
        wind.gybe_count,
        wind.last_tack_angle,
        wind.last_gybe_angle,
        wind.current_vmg,
        wind.current_tack_side.as_str(),
        wind.current_point_of_sail.as_str()
    );
}

fn main() {
    let mut tracker = WindTracker::new(NavConfig::default(), 185.0);
    let mut noise = NoiseGen::new(42);
    let mut boat = Boat {
        t_ms: 0,
        position: GeoPoint::new(37.8, -122.45),
    };

    println!("=== Windward/Leeward Race Simulation ===\n");
    println!("True wind {:.0}°, entered as 185°\n", TRUE_WIND);

    // Phase 1: pre-start, slow
    println!("Phase 1: PRE-START (30s at 5 kn)");
    sail(&mut tracker, &mut boat, &mut noise, TRUE_WIND - 50.0, 5.0, 30);
    report(&tracker, "pre-start");

    // Phase 2: beat
    let lap = tracker.on_lap_mark_requested(None, boat.t_ms);
    println!("\nPhase 2: BEAT (lap {}, starboard → port → starboard at 14 kn)", lap);
    sail(&mut tracker, &mut boat, &mut noise, TRUE_WIND - 45.0, 14.0, 90);
    sail(&mut tracker, &mut boat, &mut noise, TRUE_WIND + 45.0, 14.0, 90);
    report(&tracker, "after tack 1");
    sail(&mut tracker, &mut boat, &mut noise, TRUE_WIND - 45.0, 14.0, 90);
    report(&tracker, "after tack 2");

    // Phase 3: run
    let lap = tracker.on_lap_mark_requested(None, boat.t_ms);
    println!("\nPhase 3: RUN (lap {}, gybing downwind at 18 kn)", lap);
    let downwind = TRUE_WIND + 180.0;
    sail(&mut tracker, &mut boat, &mut noise, downwind + 35.0, 18.0, 90);
    sail(&mut tracker, &mut boat, &mut noise, downwind - 35.0, 18.0, 90);
    report(&tracker, "after gybe");

    // Phase 4: finish, coasting
    println!("\nPhase 4: FINISH (20s at 3 kn)");
    sail(&mut tracker, &mut boat, &mut noise, downwind, 3.0, 20);
    report(&tracker, "finish");

    println!("\n=== Simulation Complete ===");
    println!("\nLaps:");
    for lap in tracker.laps() {
        println!(
            "  lap {}: {} tacks (avg {:.0}°), {} gybes, {:.0} m, lap VMG {:.1} kn, on foil {:.0}%",
            lap.number,
            lap.stats.maneuvers.tack_count,
            lap.stats.maneuvers.avg_tack_angle,
            lap.stats.maneuvers.gybe_count,
            lap.distance_meters,
            lap.stats.lap_vmg,
            lap.stats.pct_on_foil
        );
    }
    let snapshot = tracker.lap_snapshot(boat.t_ms);
    println!(
        "\nRecorded lap snapshot: vmg_up={:.1} vmg_down={:.1} since_tack={:.1}s distance={:.1} m avg_tack={}° lap_vmg={:.1} foil={}%",
        snapshot.vmg_up,
        snapshot.vmg_down,
        snapshot.seconds_since_last_tack,
        snapshot.lap_distance_m,
        snapshot.avg_tack_angle,
        snapshot.cumulative_lap_vmg,
        snapshot.percent_on_foil
    );
    println!(
        "Wind estimate {:.0}° (true {:.0}°)",
        tracker.wind_direction(),
        TRUE_WIND
    );
}
