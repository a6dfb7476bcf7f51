//! Synthetic tracks for pipeline tests

use crate::sample::{PositionSample, MPS_TO_KNOTS};

/// 1 Hz track of constant-heading legs
pub(crate) struct Track {
    next_ms: u32,
    speed_mps: f32,
    samples: Vec<PositionSample>,
}

impl Track {
    pub fn new(speed_kn: f32) -> Self {
        Self {
            next_ms: 0,
            speed_mps: speed_kn / MPS_TO_KNOTS,
            samples: Vec::new(),
        }
    }

    /// Hold `heading_deg` for `seconds` samples, reported in radians like a GPS course
    pub fn hold(mut self, heading_deg: f32, seconds: u32) -> Self {
        for _ in 0..seconds {
            self.samples
                .push(PositionSample::new(heading_deg.to_radians(), self.speed_mps, self.next_ms));
            self.next_ms += 1000;
        }
        self
    }

    pub fn speed(mut self, speed_kn: f32) -> Self {
        self.speed_mps = speed_kn / MPS_TO_KNOTS;
        self
    }

    pub fn samples(self) -> Vec<PositionSample> {
        self.samples
    }
}
