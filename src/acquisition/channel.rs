use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use super::FrameSource;
use crate::frame::Frame;
use crate::{Error, Result};

/// Frames pushed from another thread, e.g. a vendor SDK callback.
pub struct ChannelSource {
    rx: Receiver<Frame>,
    name: String,
}

impl ChannelSource {
    pub fn new(rx: Receiver<Frame>) -> Self {
        Self {
            rx,
            name: "channel".to_string(),
        }
    }

    /// Bounded queue of `capacity` frames; the sender side blocks when full.
    pub fn bounded(capacity: usize) -> (Sender<Frame>, Self) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (tx, Self::new(rx))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl FrameSource for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn next_frame(&mut self, timeout: Duration) -> Result<Frame> {
        self.rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => Error::AcquisitionTimeout(timeout),
            RecvTimeoutError::Disconnected => {
                Error::Acquisition("frame sender disconnected".to_string())
            }
        })
    }
}
