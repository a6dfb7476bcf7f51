//! Engine configuration
//!
//! Every threshold the pipeline uses is injected through [`NavConfig`];
//! nothing reaches back into application settings at runtime. Hosts build
//! one from defaults, environment overrides, or (feature `serde`) a JSON
//! document, then call [`NavConfig::validate`].

use log::warn;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::angle_calculator::DEFAULT_HEADING_ALPHA;
use crate::history::DEFAULT_HEADING_HISTORY_CAPACITY;
use crate::maneuver::DEFAULT_MANEUVER_HISTORY_CAPACITY;
use crate::vmg::DEFAULT_VMG_ALPHA;

/// Default foiling / maneuver-detection speed threshold (knots)
pub const DEFAULT_FOILING_THRESHOLD_KN: f32 = 7.0;

/// Environment variable overriding the foiling threshold (knots)
pub const ENV_FOIL_THRESHOLD: &str = "SAILNAV_FOIL_THRESHOLD_KN";
/// Environment variable enabling/disabling automatic wind detection
pub const ENV_AUTO_WIND: &str = "SAILNAV_AUTO_WIND";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// Thresholds and windows for the navigation pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NavConfig {
    /// Speed at which the craft counts as foiling; maneuvers below it are ignored (knots)
    pub foiling_speed_threshold_kn: f32,
    /// EMA factor for course smoothing (1.0 = no smoothing)
    pub heading_alpha: f32,
    /// EMA factor for VMG smoothing
    pub vmg_alpha: f32,
    /// Wind angle past which a tack crossing is declared (degrees)
    pub tack_threshold_deg: f32,
    /// Wind angle past which a gybe crossing is declared (degrees)
    pub gybe_threshold_deg: f32,
    /// Length of the before/after measurement windows (seconds)
    pub measure_window_s: u32,
    /// Guard gap around the crossing excluded from measurement (seconds)
    pub ignore_window_s: u32,
    /// Heading history slots
    pub heading_history_capacity: usize,
    /// Stored maneuvers per type
    pub maneuver_history_capacity: usize,
    /// Inferred wind further than this from the current estimate is flipped 180° (degrees)
    pub wind_flip_threshold_deg: f32,
    /// Start sessions with automatic wind detection enabled
    pub auto_wind_detection: bool,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            foiling_speed_threshold_kn: DEFAULT_FOILING_THRESHOLD_KN,
            heading_alpha: DEFAULT_HEADING_ALPHA,
            vmg_alpha: DEFAULT_VMG_ALPHA,
            tack_threshold_deg: 10.0,
            gybe_threshold_deg: 170.0,
            measure_window_s: 10,
            ignore_window_s: 2,
            heading_history_capacity: DEFAULT_HEADING_HISTORY_CAPACITY,
            maneuver_history_capacity: DEFAULT_MANEUVER_HISTORY_CAPACITY,
            wind_flip_threshold_deg: 120.0,
            auto_wind_detection: true,
        }
    }
}

impl NavConfig {
    /// Defaults with a different foiling threshold
    pub fn with_foiling_threshold(threshold_kn: f32) -> Self {
        Self {
            foiling_speed_threshold_kn: threshold_kn,
            ..Default::default()
        }
    }

    /// Defaults overridden by `SAILNAV_FOIL_THRESHOLD_KN` / `SAILNAV_AUTO_WIND`
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var(ENV_FOIL_THRESHOLD) {
            match value.trim().parse::<f32>() {
                Ok(kn) => config.foiling_speed_threshold_kn = kn,
                Err(_) => warn!("Ignoring {}={:?}: not a number", ENV_FOIL_THRESHOLD, value),
            }
        }
        if let Ok(value) = std::env::var(ENV_AUTO_WIND) {
            config.auto_wind_detection = match value.trim().to_lowercase().as_str() {
                "0" | "false" | "off" | "no" => false,
                "1" | "true" | "on" | "yes" => true,
                _ => {
                    warn!("Ignoring {}={:?}: expected on/off", ENV_AUTO_WIND, value);
                    config.auto_wind_detection
                }
            };
        }

        config
    }

    /// Parse a JSON document; missing fields keep their defaults
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check(ok: bool, field: &'static str, reason: &'static str) -> Result<(), ConfigError> {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::InvalidValue { field, reason })
            }
        }

        check(
            self.foiling_speed_threshold_kn.is_finite() && self.foiling_speed_threshold_kn >= 0.0,
            "foiling_speed_threshold_kn",
            "must be a non-negative number of knots",
        )?;
        check(
            self.heading_alpha > 0.0 && self.heading_alpha <= 1.0,
            "heading_alpha",
            "must be in (0, 1]",
        )?;
        check(
            self.vmg_alpha > 0.0 && self.vmg_alpha <= 1.0,
            "vmg_alpha",
            "must be in (0, 1]",
        )?;
        check(
            self.tack_threshold_deg > 0.0 && self.tack_threshold_deg < 90.0,
            "tack_threshold_deg",
            "must be in (0, 90)",
        )?;
        check(
            self.gybe_threshold_deg > 90.0 && self.gybe_threshold_deg < 180.0,
            "gybe_threshold_deg",
            "must be in (90, 180)",
        )?;
        check(
            self.measure_window_s > 0,
            "measure_window_s",
            "must be at least one second",
        )?;
        check(
            self.heading_history_capacity > 0,
            "heading_history_capacity",
            "must be at least one slot",
        )?;
        check(
            (0.0..=180.0).contains(&self.wind_flip_threshold_deg),
            "wind_flip_threshold_deg",
            "must be in [0, 180]",
        )?;
        Ok(())
    }

    /// Total delay between a crossing and its measurement (milliseconds)
    pub fn guard_window_ms(&self) -> u32 {
        (self.measure_window_s + self.ignore_window_s).saturating_mul(1000)
    }

    pub fn ignore_window_ms(&self) -> u32 {
        self.ignore_window_s.saturating_mul(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = NavConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.foiling_speed_threshold_kn, 7.0);
        assert_eq!(config.guard_window_ms(), 12_000);
        assert_eq!(config.ignore_window_ms(), 2_000);
    }

    #[test]
    fn test_default_alphas_use_shared_constants() {
        let config = NavConfig::default();
        assert_eq!(config.heading_alpha, DEFAULT_HEADING_ALPHA);
        assert_eq!(config.vmg_alpha, DEFAULT_VMG_ALPHA);
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = NavConfig {
            heading_alpha: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "heading_alpha", .. })
        ));

        let config = NavConfig::with_foiling_threshold(f32::NAN);
        assert!(config.validate().is_err());

        let config = NavConfig {
            gybe_threshold_deg: 45.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_partial_document_keeps_defaults() {
        let config = NavConfig::from_json_str(r#"{ "foiling_speed_threshold_kn": 12.5 }"#).unwrap();
        assert_eq!(config.foiling_speed_threshold_kn, 12.5);
        assert_eq!(config.measure_window_s, 10);

        assert!(matches!(
            NavConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(NavConfig::from_json_str(r#"{ "vmg_alpha": 2.0 }"#).is_err());
    }
}
