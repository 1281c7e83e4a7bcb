use std::time::Duration;

use thiserror::Error;

use crate::frame::Axis;
use crate::processing::{FitDidNotConverge, ProcessorKind};

/// Errors produced by the measurement core.
#[derive(Debug, Error)]
pub enum Error {
    /// No frame arrived from the acquisition source within the bound.
    #[error("no frame received within {0:?}")]
    AcquisitionTimeout(Duration),

    #[error("acquisition failed: {0}")]
    Acquisition(String),

    #[error(transparent)]
    Fit(#[from] FitDidNotConverge),

    /// Selected processor exists as a variant but has no implementation.
    #[error("{0} processor is not supported")]
    NotSupported(ProcessorKind),

    #[error("channel selection {selector} does not match a frame with {channels} channel(s)")]
    ChannelMismatch { selector: String, channels: usize },

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// User supplied a value that does not parse or is out of range.
    #[error("invalid {field}: {value:?}")]
    InvalidInput { field: &'static str, value: String },

    #[error("unknown unit {0:?}, expected \"microns\" or \"arcseconds\"")]
    UnknownUnit(String),

    #[error("position {position} would leave a gap after the last stored position {len}")]
    PositionGap { position: usize, len: usize },

    #[error("no valid peak on the {0} axis to zero against")]
    NoPeakAvailable(Axis),

    #[error("averaging window is already collecting")]
    WindowBusy,

    #[error("measurement cancelled")]
    MeasurementCancelled,

    #[error("no peak sample received for {0:?}")]
    StreamStalled(Duration),

    #[error("peak stream closed")]
    StreamClosed,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, Error>;
