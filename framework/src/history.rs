//! Time-stamped heading history
//!
//! Fixed-capacity ring buffer of smoothed headings. At 1 Hz the default 60
//! slots hold one minute, enough for the before/after windows of a
//! maneuver measured 12 s after the crossing.

use std::collections::VecDeque;

use crate::angles::CircularMean;

/// Default number of heading slots (~60 s at 1 Hz)
pub const DEFAULT_HEADING_HISTORY_CAPACITY: usize = 60;

/// One smoothed heading with its monotonic timestamp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingSample {
    /// Heading in degrees [0, 360)
    pub heading: f32,
    /// Monotonic timestamp (milliseconds)
    pub timestamp_ms: u32,
    /// False for placeholder entries that must not enter averages
    pub valid: bool,
}

impl HeadingSample {
    pub fn new(heading: f32, timestamp_ms: u32) -> Self {
        Self {
            heading,
            timestamp_ms,
            valid: true,
        }
    }
}

/// Ring buffer of heading samples, oldest overwritten first
#[derive(Debug, Clone)]
pub struct HeadingHistory {
    samples: VecDeque<HeadingSample>,
    capacity: usize,
}

impl HeadingHistory {
    /// Create an empty history; a zero capacity is raised to one slot
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest when full
    pub fn push(&mut self, sample: HeadingSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<&HeadingSample> {
        self.samples.back()
    }

    /// Samples from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &HeadingSample> {
        self.samples.iter()
    }

    /// Circular mean of valid samples with `start_ms <= t <= end_ms`
    ///
    /// Returns None when no sample qualifies.
    pub fn average_between(&self, start_ms: u32, end_ms: u32) -> Option<f32> {
        let mut mean = CircularMean::new();
        mean.extend(
            self.samples
                .iter()
                .filter(|s| s.valid && (start_ms..=end_ms).contains(&s.timestamp_ms))
                .map(|s| s.heading),
        );
        mean.mean()
    }
}

impl Default for HeadingHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HEADING_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::angles::angle_abs_difference;

    #[test]
    fn test_evicts_oldest_when_full() {
        let mut history = HeadingHistory::with_capacity(3);
        for i in 0..5u32 {
            history.push(HeadingSample::new(i as f32, i * 1000));
        }
        assert_eq!(history.len(), 3);
        let stamps: Vec<u32> = history.iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(stamps, vec![2000, 3000, 4000]);
        assert_eq!(history.latest().unwrap().timestamp_ms, 4000);
    }

    #[test]
    fn test_window_is_inclusive() {
        let mut history = HeadingHistory::default();
        history.push(HeadingSample::new(10.0, 1000));
        history.push(HeadingSample::new(20.0, 2000));
        history.push(HeadingSample::new(30.0, 3000));

        let avg = history.average_between(2000, 3000).unwrap();
        assert!((avg - 25.0).abs() < 1e-3, "got {}", avg);
    }

    #[test]
    fn test_empty_window_is_none_not_zero() {
        let mut history = HeadingHistory::default();
        history.push(HeadingSample::new(90.0, 1000));
        assert_eq!(history.average_between(5000, 9000), None);
    }

    #[test]
    fn test_invalid_samples_skipped() {
        let mut history = HeadingHistory::default();
        history.push(HeadingSample::new(90.0, 1000));
        history.push(HeadingSample {
            heading: 270.0,
            timestamp_ms: 2000,
            valid: false,
        });
        let avg = history.average_between(0, 5000).unwrap();
        assert!(angle_abs_difference(avg, 90.0) < 1e-3);
    }

    #[test]
    fn test_zero_capacity_keeps_one_slot() {
        let mut history = HeadingHistory::with_capacity(0);
        history.push(HeadingSample::new(1.0, 1));
        history.push(HeadingSample::new(2.0, 2));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.len(), 1);
    }
}
