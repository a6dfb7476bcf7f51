//! NMEA 0183 RMC Parser
//!
//! Pure Rust parser for the "recommended minimum" sentence (`$GPRMC` /
//! `$GNRMC`) emitted by most GPS receivers. It provides position, speed
//! over ground, course over ground and UTC time.
//!
//! # Features
//!
//! - Byte-fed line assembly (UART or file replay)
//! - Checksum verification
//! - Typed errors for every rejected line
//! - Optional `log` output (feature `logging`, on by default)
//!
//! # Example
//!
//! ```
//! use nmea_rmc::NmeaParser;
//!
//! let mut parser = NmeaParser::new();
//! let line = b"$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n";
//!
//! for &byte in line {
//!     if let Some(Ok(fix)) = parser.feed_byte(byte) {
//!         assert!(fix.valid);
//!         println!("Position: {:.5}, {:.5}", fix.lat, fix.lon);
//!         println!("Speed: {:.1} m/s", fix.speed_mps);
//!     }
//! }
//! assert!(parser.last_fix().is_some());
//! ```

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use thiserror::Error;

#[cfg(feature = "logging")]
use log::debug;

/// Knots to meters per second
pub const KNOTS_TO_MPS: f32 = 0.514_444;

/// Longest accepted sentence (NMEA allows 82 characters; some receivers exceed it)
pub const MAX_SENTENCE_LEN: usize = 120;

/// Why a line was rejected
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NmeaError {
    #[error("checksum mismatch: sentence says {expected:02X}, computed {actual:02X}")]
    BadChecksum { expected: u8, actual: u8 },
    #[error("sentence truncated")]
    Truncated,
    #[error("unsupported sentence {0:?}")]
    UnsupportedSentence(String),
    #[error("invalid {0} field")]
    InvalidField(&'static str),
}

/// GPS fix data from an RMC sentence
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpsFix {
    /// Latitude in degrees (positive = North, negative = South)
    pub lat: f64,
    /// Longitude in degrees (positive = East, negative = West)
    pub lon: f64,
    /// Ground speed in m/s
    pub speed_mps: f32,
    /// Course over ground in radians, None when the receiver leaves it blank
    pub course_rad: Option<f32>,
    /// Fix validity (A = valid, V = invalid)
    pub valid: bool,
    pub time: Option<NaiveTime>,
    pub date: Option<NaiveDate>,
}

impl GpsFix {
    /// UTC timestamp, when both date and time were present
    pub fn utc(&self) -> Option<DateTime<Utc>> {
        let naive = self.date?.and_time(self.time?);
        Some(Utc.from_utc_datetime(&naive))
    }
}

/// Line-assembling RMC parser
pub struct NmeaParser {
    line: Vec<u8>,
    overflowed: bool,
    last_fix: Option<GpsFix>,
    rejected: u32,
}

impl NmeaParser {
    pub fn new() -> Self {
        Self {
            line: Vec::with_capacity(MAX_SENTENCE_LEN),
            overflowed: false,
            last_fix: None,
            rejected: 0,
        }
    }

    /// Feed a single byte
    ///
    /// Returns `Some` when a newline completes a line: the parsed fix, or
    /// why the line was rejected. Lines that are not RMC sentences come
    /// back as [`NmeaError::UnsupportedSentence`] so callers can skip them.
    pub fn feed_byte(&mut self, byte: u8) -> Option<Result<GpsFix, NmeaError>> {
        match byte {
            b'$' => {
                self.line.clear();
                self.overflowed = false;
                self.line.push(byte);
                None
            }
            b'\r' => None,
            b'\n' => {
                if self.line.is_empty() {
                    return None;
                }
                let result = if self.overflowed {
                    Err(NmeaError::Truncated)
                } else {
                    std::str::from_utf8(&self.line)
                        .map_err(|_| NmeaError::InvalidField("encoding"))
                        .and_then(parse_rmc)
                };
                self.line.clear();
                self.overflowed = false;
                Some(self.record(result))
            }
            _ => {
                if self.line.len() < MAX_SENTENCE_LEN {
                    self.line.push(byte);
                } else {
                    self.overflowed = true;
                }
                None
            }
        }
    }

    /// Parse one complete line (without the line terminator)
    pub fn parse_line(&mut self, line: &str) -> Result<GpsFix, NmeaError> {
        let result = parse_rmc(line.trim_end());
        self.record(result)
    }

    fn record(&mut self, result: Result<GpsFix, NmeaError>) -> Result<GpsFix, NmeaError> {
        match &result {
            Ok(fix) => self.last_fix = Some(*fix),
            Err(NmeaError::UnsupportedSentence(_)) => {}
            Err(_e) => {
                self.rejected += 1;
                #[cfg(feature = "logging")]
                debug!("NMEA line rejected: {}", _e);
            }
        }
        result
    }

    /// Most recent successfully parsed fix (valid or not)
    pub fn last_fix(&self) -> Option<&GpsFix> {
        self.last_fix.as_ref()
    }

    /// RMC lines rejected for checksum, truncation or bad fields
    pub fn rejected(&self) -> u32 {
        self.rejected
    }
}

impl Default for NmeaParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Check the `*hh` checksum, returning the sentence body between `$` and `*`
///
/// Sentences without a checksum are accepted as-is.
pub fn verify_checksum(line: &str) -> Result<&str, NmeaError> {
    let line = line.strip_prefix('$').ok_or(NmeaError::Truncated)?;
    let Some((body, checksum)) = line.split_once('*') else {
        return Ok(line);
    };
    let checksum = checksum.trim();
    if checksum.len() != 2 {
        return Err(NmeaError::Truncated);
    }
    let expected =
        u8::from_str_radix(checksum, 16).map_err(|_| NmeaError::InvalidField("checksum"))?;
    let actual = body.bytes().fold(0u8, |acc, b| acc ^ b);
    if expected != actual {
        return Err(NmeaError::BadChecksum { expected, actual });
    }
    Ok(body)
}

/// Parse a `$GPRMC` / `$GNRMC` sentence
pub fn parse_rmc(line: &str) -> Result<GpsFix, NmeaError> {
    let body = verify_checksum(line)?;
    let fields: Vec<&str> = body.split(',').collect();

    let talker = fields[0];
    if !(talker.len() == 5 && talker.ends_with("RMC")) {
        return Err(NmeaError::UnsupportedSentence(talker.to_string()));
    }
    if fields.len() < 10 {
        return Err(NmeaError::Truncated);
    }

    let time = parse_time(fields[1]);
    let date = parse_date(fields[9]);

    if fields[2] != "A" {
        return Ok(GpsFix {
            valid: false,
            time,
            date,
            ..Default::default()
        });
    }

    let lat = parse_coordinate(fields[3], fields[4]).ok_or(NmeaError::InvalidField("latitude"))?;
    let lon = parse_coordinate(fields[5], fields[6]).ok_or(NmeaError::InvalidField("longitude"))?;

    let speed_knots = match fields[7] {
        "" => 0.0,
        s => s.parse::<f32>().map_err(|_| NmeaError::InvalidField("speed"))?,
    };
    let course_rad = match fields[8] {
        "" => None,
        s => Some(
            s.parse::<f32>()
                .map_err(|_| NmeaError::InvalidField("course"))?
                .to_radians(),
        ),
    };

    Ok(GpsFix {
        lat,
        lon,
        speed_mps: speed_knots * KNOTS_TO_MPS,
        course_rad,
        valid: true,
        time,
        date,
    })
}

/// Parse NMEA coordinate field (ddmm.mmmm format)
fn parse_coordinate(coord_str: &str, dir_str: &str) -> Option<f64> {
    if coord_str.is_empty() || dir_str.is_empty() {
        return None;
    }

    let value = coord_str.parse::<f64>().ok()?;

    let degrees = (value / 100.0).floor();
    let minutes = value - (degrees * 100.0);

    let decimal = degrees + (minutes / 60.0);

    match dir_str {
        "N" | "E" => Some(decimal),
        "S" | "W" => Some(-decimal),
        _ => None,
    }
}

/// Parse NMEA time field (hhmmss.ss format)
fn parse_time(time_str: &str) -> Option<NaiveTime> {
    if time_str.len() < 6 || !time_str.is_ascii() {
        return None;
    }

    let hh = time_str[0..2].parse::<u32>().ok()?;
    let mm = time_str[2..4].parse::<u32>().ok()?;
    let ss = time_str[4..6].parse::<u32>().ok()?;
    let millis = match time_str.get(6..) {
        Some(frac) if frac.starts_with('.') && frac.len() > 1 => {
            (format!("0{}", frac).parse::<f64>().ok()? * 1000.0).round() as u32
        }
        _ => 0,
    };

    NaiveTime::from_hms_milli_opt(hh, mm, ss, millis.min(999))
}

/// Parse NMEA date field (ddmmyy format, years 2000-2099)
fn parse_date(date_str: &str) -> Option<NaiveDate> {
    if date_str.len() != 6 || !date_str.is_ascii() {
        return None;
    }

    let dd = date_str[0..2].parse::<u32>().ok()?;
    let mm = date_str[2..4].parse::<u32>().ok()?;
    let yy = date_str[4..6].parse::<i32>().ok()?;

    NaiveDate::from_ymd_opt(2000 + yy, mm, dd)
}
