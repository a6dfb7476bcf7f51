//! Velocity made good
//!
//! Component of boat speed along the wind axis, toward the wind when
//! upwind and away from it when downwind. Always reported as a magnitude;
//! the direction is carried by the point of sail.

/// Default EMA factor for VMG smoothing
pub const DEFAULT_VMG_ALPHA: f32 = 0.1;

/// Smoothed VMG tracker
#[derive(Debug, Clone)]
pub struct VmgCalculator {
    alpha: f32,
    vmg: f32,
}

impl VmgCalculator {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            vmg: 0.0,
        }
    }

    /// Update with a new speed and wind angle
    ///
    /// Zero (or invalid) speed resets VMG to 0 immediately, with no fade.
    /// The first non-zero sample after a reset seeds the value directly;
    /// later samples are EMA-smoothed.
    ///
    /// # Arguments
    /// * `speed_kn` - Boat speed (knots)
    /// * `is_upwind` - Current point of sail
    /// * `abs_wind_angle` - |wind angle relative to course| (degrees, 0-180)
    ///
    /// # Returns
    /// Smoothed VMG in knots, never negative
    ///
    /// # Example
    /// ```
    /// use sail_nav::vmg::VmgCalculator;
    ///
    /// let mut vmg = VmgCalculator::new(0.1);
    /// // 45° off the wind at 10 kn
    /// let v = vmg.calculate_vmg(10.0, true, 45.0);
    /// assert!((v - 7.071).abs() < 0.01);
    ///
    /// // Stopping resets immediately
    /// assert_eq!(vmg.calculate_vmg(0.0, true, 45.0), 0.0);
    /// ```
    pub fn calculate_vmg(&mut self, speed_kn: f32, is_upwind: bool, abs_wind_angle: f32) -> f32 {
        if speed_kn.is_nan() || speed_kn <= 0.0 {
            self.vmg = 0.0;
            return 0.0;
        }

        let theta = if is_upwind {
            abs_wind_angle
        } else {
            180.0 - abs_wind_angle
        };
        let raw = (speed_kn * theta.to_radians().cos()).abs();

        self.vmg = if self.vmg > 0.0 {
            self.vmg + self.alpha * (raw - self.vmg)
        } else {
            raw
        };
        self.vmg
    }

    /// Current smoothed VMG (knots)
    pub fn vmg(&self) -> f32 {
        self.vmg
    }
}

impl Default for VmgCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_VMG_ALPHA)
    }
}
