//! Frame → profile → peak → arcsecond conversion.

pub mod calibration;
pub mod peak_fit;
pub mod projector;

pub use calibration::*;
pub use peak_fit::*;
pub use projector::*;

use tracing::trace;

use crate::frame::{AxisPair, ChannelSelector, Frame};
use crate::Result;

/// Per-axis profiles and fit outcomes for one frame.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub profiles: AxisPair<IntensityProfile>,
    pub fits: AxisPair<std::result::Result<PeakFitResult, FitDidNotConverge>>,
}

/// Stateless part of the per-frame work: projection and fitting.
pub struct PeakPipeline {
    channel: ChannelSelector,
    fitter: Box<dyn PeakFitter>,
}

impl PeakPipeline {
    pub fn new(channel: ChannelSelector, fitter: Box<dyn PeakFitter>) -> Self {
        Self { channel, fitter }
    }

    pub fn fitter_name(&self) -> &str {
        self.fitter.name()
    }

    pub fn analyze(&self, frame: &Frame) -> Result<FrameAnalysis> {
        let profiles = project_both(frame, self.channel)?;
        let fits = AxisPair::new(
            self.fitter.fit(&profiles.x),
            self.fitter.fit(&profiles.y),
        );
        trace!(
            fitter = self.fitter.name(),
            x = ?fits.x.as_ref().map(|f| f.center).ok(),
            y = ?fits.y.as_ref().map(|f| f.center).ok(),
            "frame analyzed"
        );
        Ok(FrameAnalysis { profiles, fits })
    }
}
