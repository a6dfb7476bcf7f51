//! Replay an NMEA log through the navigation engine
//!
//! Reads RMC sentences from a file (or stdin), feeds every fix to a
//! `WindTracker` and prints wind and lap snapshots as JSON lines. Lap marks
//! can be injected at fixed offsets from the first fix.
//!
//! ```text
//! track-replay session.nmea --wind 225 --lap-at 0 --lap-at 600 --every 5
//! RUST_LOG=debug track-replay session.nmea --wind 225 --maneuvers
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use log::{info, warn};
use nmea_rmc::{GpsFix, NmeaError, NmeaParser};
use sail_nav::{GeoPoint, LapRecord, LapSnapshot, ManeuverRecord, NavConfig, PositionSample, WindSnapshot, WindTracker};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "track-replay")]
#[command(about = "Replay an NMEA log through the sail-nav engine", long_about = None)]
struct Args {
    /// NMEA log file ("-" for stdin)
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Initial wind direction (degrees true, direction the wind blows from)
    #[arg(long, value_name = "DEG")]
    wind: f32,

    /// Foiling speed threshold (knots); overrides config and environment
    #[arg(long, value_name = "KN")]
    foil_threshold: Option<f32>,

    /// JSON engine configuration
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Mark a lap this many seconds after the first fix (repeatable)
    #[arg(long = "lap-at", value_name = "SECONDS")]
    lap_at: Vec<f64>,

    /// Lock the wind direction (no automatic updates)
    #[arg(long, default_value_t = false)]
    lock: bool,

    /// Emit a snapshot every N accepted fixes (0 = only at the end)
    #[arg(long, default_value_t = 10)]
    every: u32,

    /// Print every resolved maneuver at the end
    #[arg(long, default_value_t = false)]
    maneuvers: bool,
}

#[derive(Serialize)]
struct SnapshotLine {
    t_ms: u32,
    lap: u32,
    wind: WindSnapshot,
    lap_data: LapSnapshot,
}

#[derive(Serialize)]
struct Summary<'a> {
    fixes: u32,
    void_fixes: u32,
    rejected_lines: u32,
    dropped_samples: u32,
    wind: WindSnapshot,
    laps: Vec<&'a LapRecord>,
}

/// Converts fix time to engine milliseconds since the first fix
struct Clock {
    start: Option<DateTime<Utc>>,
    fallback_ms: u32,
}

impl Clock {
    fn timestamp_ms(&mut self, fix: &GpsFix) -> u32 {
        let ms = match (fix.utc(), self.start) {
            (Some(now), Some(start)) => (now - start).num_milliseconds().clamp(0, u32::MAX as i64) as u32,
            (Some(now), None) => {
                self.start = Some(now);
                0
            }
            // No time on the fix: assume 1 Hz
            (None, _) => self.fallback_ms,
        };
        self.fallback_ms = ms.saturating_add(1000);
        ms
    }
}

fn to_sample(fix: &GpsFix, timestamp_ms: u32) -> PositionSample {
    PositionSample {
        heading: fix.course_rad,
        speed_mps: Some(fix.speed_mps),
        position: Some(GeoPoint::new(fix.lat, fix.lon)),
        timestamp_ms,
        utc: fix.utc(),
    }
}

fn load_config(args: &Args) -> Result<NavConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            NavConfig::from_json_str(&json).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => NavConfig::from_env(),
    };
    if let Some(threshold) = args.foil_threshold {
        config.foiling_speed_threshold_kn = threshold;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn lap_marks_ms(args: &Args) -> Result<Vec<u32>> {
    let mut marks = Vec::with_capacity(args.lap_at.len());
    for &seconds in &args.lap_at {
        if !seconds.is_finite() || seconds < 0.0 {
            bail!("--lap-at must be a non-negative number of seconds, got {}", seconds);
        }
        marks.push((seconds * 1000.0).round() as u32);
    }
    marks.sort_unstable();
    Ok(marks)
}

fn emit<T: Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let lap_marks = lap_marks_ms(&args)?;

    let reader: Box<dyn BufRead> = if args.input.as_os_str() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("opening {}", args.input.display()))?;
        Box::new(BufReader::new(file))
    };

    let mut tracker = WindTracker::new(config, args.wind);
    if args.lock {
        tracker.lock_wind_direction();
    }

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let mut parser = NmeaParser::new();
    let mut clock = Clock {
        start: None,
        fallback_ms: 0,
    };
    let mut next_mark = lap_marks.iter().copied().peekable();
    let mut fixes = 0u32;
    let mut void_fixes = 0u32;
    let mut last_ms = 0u32;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", line_no + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let fix = match parser.parse_line(&line) {
            Ok(fix) => fix,
            Err(NmeaError::UnsupportedSentence(_)) => continue,
            Err(e) => {
                warn!("line {}: {}", line_no + 1, e);
                continue;
            }
        };
        if !fix.valid {
            void_fixes += 1;
            continue;
        }

        let t_ms = clock.timestamp_ms(&fix);
        while let Some(mark) = next_mark.next_if(|&mark| mark <= t_ms) {
            let lap = tracker.on_lap_mark_requested(Some(GeoPoint::new(fix.lat, fix.lon)), mark);
            info!("lap {} marked at {:.1}s", lap, mark as f64 / 1000.0);
        }

        // Missing course is expected at standstill; the engine reports it
        let _ = tracker.on_position_sample(to_sample(&fix, t_ms));
        fixes += 1;
        last_ms = t_ms;

        if args.every > 0 && fixes % args.every == 0 {
            emit(
                &mut out,
                &SnapshotLine {
                    t_ms,
                    lap: tracker.current_lap(),
                    wind: tracker.wind_snapshot(),
                    lap_data: tracker.lap_snapshot(t_ms),
                },
            )?;
        }
    }

    // Let a maneuver near the end of the log resolve
    tracker.tick(last_ms.saturating_add(tracker.config().guard_window_ms()));

    if args.maneuvers {
        for record in tracker.maneuvers() {
            emit::<ManeuverRecord>(&mut out, record)?;
        }
    }

    let laps: Vec<&LapRecord> = tracker.laps().collect();
    emit(
        &mut out,
        &Summary {
            fixes,
            void_fixes,
            rejected_lines: parser.rejected(),
            dropped_samples: tracker.dropped_samples(),
            wind: tracker.wind_snapshot(),
            laps,
        },
    )?;
    out.flush()?;

    info!(
        "{} fixes replayed: {} tacks, {} gybes, wind {:.0}",
        fixes,
        tracker.tack_count(),
        tracker.gybe_count(),
        tracker.wind_direction()
    );
    Ok(())
}
