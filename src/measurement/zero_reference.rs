use std::time::{Duration, Instant};

use crate::frame::{Axis, AxisPair};
use crate::{Error, Result};

/// Per-axis baseline in pixels and the start of each axis's time basis.
///
/// Only [`ZeroReferenceTracker::reset`] moves the baseline; observing new
/// peaks just remembers the latest valid raw position.
#[derive(Debug, Clone)]
pub struct ZeroReferenceTracker {
    zero: AxisPair<f64>,
    epoch: AxisPair<Instant>,
    latest_raw: AxisPair<Option<f64>>,
}

impl ZeroReferenceTracker {
    pub fn new(now: Instant) -> Self {
        Self {
            zero: AxisPair::default(),
            epoch: AxisPair::new(now, now),
            latest_raw: AxisPair::default(),
        }
    }

    /// Remember a raw (pixel) peak. Failed fits keep the previous valid one.
    pub fn observe(&mut self, axis: Axis, raw_px: Option<f64>) {
        if let Some(raw) = raw_px.filter(|v| v.is_finite()) {
            self.latest_raw[axis] = Some(raw);
        }
    }

    pub fn latest_raw(&self, axis: Axis) -> Option<f64> {
        self.latest_raw[axis]
    }

    pub fn zero(&self, axis: Axis) -> f64 {
        self.zero[axis]
    }

    /// Raw pixel position relative to the axis baseline.
    pub fn relative(&self, axis: Axis, raw_px: f64) -> f64 {
        raw_px - self.zero[axis]
    }

    pub fn elapsed(&self, axis: Axis, now: Instant) -> Duration {
        now.saturating_duration_since(self.epoch[axis])
    }

    /// Move the baseline to the latest valid raw peak and restart the axis clock.
    ///
    /// Returns the new baseline in pixels.
    pub fn reset(&mut self, axis: Axis, now: Instant) -> Result<f64> {
        let raw = self.latest_raw[axis].ok_or(Error::NoPeakAvailable(axis))?;
        self.zero[axis] = raw;
        self.epoch[axis] = now;
        Ok(raw)
    }
}
