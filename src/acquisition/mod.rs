//! Frame sources feeding the producer.
//!
//! The core never talks to a camera driver. Anything that can hand over a
//! [`Frame`] within a timeout implements [`FrameSource`].

pub mod channel;
pub mod sequence;
pub mod simulated;

pub use channel::ChannelSource;
pub use sequence::{load_frame, ImageSequenceSource};
pub use simulated::{BeamControl, SimulatedBeamSource, SimulationSettings};

use std::time::Duration;

use crate::frame::Frame;
use crate::Result;

/// Reference bound on how long the producer waits for a frame.
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_millis(5000);

pub trait FrameSource: Send {
    /// Short human-readable name for logs
    fn name(&self) -> &str;

    /// Block for the next frame, failing with
    /// [`Error::AcquisitionTimeout`](crate::Error::AcquisitionTimeout) when
    /// none arrives within `timeout`.
    fn next_frame(&mut self, timeout: Duration) -> Result<Frame>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn next_frame(&mut self, timeout: Duration) -> Result<Frame> {
        (**self).next_frame(timeout)
    }
}
