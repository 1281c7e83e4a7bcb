pub mod acquisition;
pub mod config;
pub mod error;
pub mod frame;
pub mod live;
pub mod logging;
pub mod measurement;
pub mod processing;

pub use acquisition::{
    load_frame, BeamControl, ChannelSource, FrameSource, ImageSequenceSource,
    SimulatedBeamSource, SimulationSettings,
};
pub use config::{Config, ConfigFormat};
pub use error::{Error, Result};
pub use frame::{Axis, AxisPair, ChannelSelector, Frame};
pub use live::{DisplaySnapshot, LiveHandle, LiveSettings, Producer, ProducerHandle};
pub use measurement::*;
pub use processing::*;

/// Wire up a producer from configuration: fitter, channel selection and
/// calibration all come from `config`.
pub fn build_producer(
    source: Box<dyn FrameSource>,
    config: &Config,
) -> Result<(Producer, LiveHandle)> {
    let fitter = build_fitter(config.processing.processor, config.processing.fit)?;
    let pipeline = PeakPipeline::new(config.processing.channel, fitter);
    let converter = config.optics.converter()?;
    let settings = LiveSettings::from_config(config)?;
    Ok(Producer::new(source, pipeline, converter, &settings))
}
