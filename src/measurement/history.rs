//! Bounded per-axis history of calibrated peak positions.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::frame::{Axis, AxisPair};

/// What happens when an axis buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest entry to make room.
    #[default]
    DropOldest,
    /// Keep the buffer as is and discard the incoming entry.
    DropNewest,
}

/// One history point. `value` is NaN when the fit failed for that frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Seconds since the axis time basis was last reset.
    pub elapsed_s: f64,
    /// Arcseconds relative to the axis zero reference.
    pub value: f64,
}

impl HistoryEntry {
    pub fn is_valid(&self) -> bool {
        self.value.is_finite()
    }
}

#[derive(Debug, Clone)]
struct AxisBuffer {
    entries: VecDeque<HistoryEntry>,
    dropped: u64,
}

impl AxisBuffer {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(4096)),
            dropped: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PeakHistoryLog {
    axes: AxisPair<AxisBuffer>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl PeakHistoryLog {
    /// # Panics
    /// Panics if capacity is zero.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        assert!(capacity > 0, "history capacity must be greater than 0");
        Self {
            axes: AxisPair::from_fn(|_| AxisBuffer::with_capacity(capacity)),
            capacity,
            policy,
        }
    }

    /// Append an entry; returns whether it was stored.
    pub fn append(&mut self, axis: Axis, elapsed_s: f64, value: f64) -> bool {
        let capacity = self.capacity;
        let buffer = &mut self.axes[axis];
        let entry = HistoryEntry { elapsed_s, value };

        if buffer.entries.len() < capacity {
            buffer.entries.push_back(entry);
            return true;
        }

        buffer.dropped += 1;
        if buffer.dropped == 1 {
            warn!(axis = %axis, capacity, policy = ?self.policy, "peak history full");
        }
        match self.policy {
            OverflowPolicy::DropOldest => {
                buffer.entries.pop_front();
                buffer.entries.push_back(entry);
                true
            }
            OverflowPolicy::DropNewest => false,
        }
    }

    pub fn len(&self, axis: Axis) -> usize {
        self.axes[axis].entries.len()
    }

    pub fn is_empty(&self, axis: Axis) -> bool {
        self.axes[axis].entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Entries lost to the overflow policy since the last clear.
    pub fn dropped(&self, axis: Axis) -> u64 {
        self.axes[axis].dropped
    }

    pub fn latest(&self, axis: Axis) -> Option<HistoryEntry> {
        self.axes[axis].entries.back().copied()
    }

    /// Oldest to newest, including invalid markers.
    pub fn entries(&self, axis: Axis) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.axes[axis].entries.iter()
    }

    /// Valid points only, as `(elapsed_s, value)` pairs for plotting.
    pub fn series(&self, axis: Axis) -> Vec<(f64, f64)> {
        self.entries(axis)
            .filter(|e| e.is_valid())
            .map(|e| (e.elapsed_s, e.value))
            .collect()
    }

    /// The newest `max_points` valid points of [`series`](Self::series),
    /// still oldest first.
    pub fn series_tail(&self, axis: Axis, max_points: usize) -> Vec<(f64, f64)> {
        let mut tail: Vec<(f64, f64)> = self.axes[axis]
            .entries
            .iter()
            .rev()
            .filter(|e| e.is_valid())
            .take(max_points)
            .map(|e| (e.elapsed_s, e.value))
            .collect();
        tail.reverse();
        tail
    }

    /// Hand every buffered entry of `axis` to the caller and empty the buffer.
    pub fn drain(&mut self, axis: Axis) -> Vec<HistoryEntry> {
        self.axes[axis].entries.drain(..).collect()
    }

    pub fn clear(&mut self, axis: Axis) {
        let buffer = &mut self.axes[axis];
        buffer.entries.clear();
        buffer.dropped = 0;
    }
}
