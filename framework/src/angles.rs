//! Angle arithmetic on compass bearings
//!
//! All bearings are in degrees. Compass bearings live in [0, 360);
//! wind-relative angles live in (-180, 180].

/// Normalize any finite angle to the compass range [0, 360)
pub fn normalize_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Normalize any finite angle to the signed range (-180, 180]
pub fn normalize_signed(angle: f32) -> f32 {
    let wrapped = normalize_degrees(angle);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Signed shortest rotation from `from` to `to`, in (-180, 180]
///
/// Positive means clockwise (increasing bearing).
pub fn signed_delta(from: f32, to: f32) -> f32 {
    normalize_signed(to - from)
}

/// Shortest-arc absolute difference between two bearings, in [0, 180]
pub fn angle_abs_difference(a: f32, b: f32) -> f32 {
    signed_delta(a, b).abs()
}

/// Bisector of two bearings, computed on the unit circle
///
/// Sums the two unit vectors and converts the resultant back to a bearing.
/// Opposite bearings have no defined bisector; a near-zero resultant
/// returns 0.
pub fn bisector_angle(a: f32, b: f32) -> f32 {
    let (a_rad, b_rad) = (a.to_radians(), b.to_radians());
    let x = a_rad.cos() + b_rad.cos();
    let y = a_rad.sin() + b_rad.sin();

    if x.abs() < 1e-6 && y.abs() < 1e-6 {
        return 0.0;
    }

    normalize_degrees(y.atan2(x).to_degrees())
}

/// Running unit-vector sum for circular averaging of bearings
#[derive(Debug, Clone, Copy, Default)]
pub struct CircularMean {
    sum_cos: f64,
    sum_sin: f64,
    count: u32,
}

impl CircularMean {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one bearing (degrees)
    pub fn add(&mut self, bearing: f32) {
        let rad = (bearing as f64).to_radians();
        self.sum_cos += rad.cos();
        self.sum_sin += rad.sin();
        self.count += 1;
    }

    /// Number of bearings added
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Mean bearing in [0, 360), or None when nothing was added
    ///
    /// None means "insufficient data" and must never be read as 0°.
    pub fn mean(&self) -> Option<f32> {
        if self.count == 0 {
            return None;
        }
        let mean = self.sum_sin.atan2(self.sum_cos).to_degrees() as f32;
        Some(normalize_degrees(mean))
    }
}

impl Extend<f32> for CircularMean {
    fn extend<I: IntoIterator<Item = f32>>(&mut self, iter: I) {
        for bearing in iter {
            self.add(bearing);
        }
    }
}
