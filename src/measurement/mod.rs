//! Stateful measurement building blocks: zero reference, history, averaging
//! and straightness sampling.

pub mod averaging;
pub mod history;
pub mod straightness;
pub mod zero_reference;

pub use averaging::*;
pub use history::*;
pub use straightness::*;
pub use zero_reference::*;

use std::time::Instant;

use crossbeam_channel::Receiver;

use crate::frame::AxisPair;

/// Calibrated, zero-referenced peak positions of one frame, in arcseconds.
/// NaN marks an axis whose fit failed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakSample {
    pub at: Instant,
    pub values: AxisPair<f64>,
}

/// Source of live peak samples for consumers that need every frame.
pub trait SampleFeed {
    /// Register a new subscriber. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> Receiver<PeakSample>;
}
