//! Synthetic autocollimator images: one Gaussian spot on a noisy background.
//!
//! The spot starts at the sensor centre, drifts slowly, jitters from frame to
//! frame and can be displaced through a [`BeamControl`] handle to emulate a
//! tilting mirror.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::FrameSource;
use crate::frame::{Axis, AxisPair, Frame};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub width: usize,
    pub height: usize,
    pub bit_depth: u8,
    /// Peak height above background, in counts.
    pub amplitude: f64,
    pub background: f64,
    pub spot_sigma_px: f64,
    /// Standard deviation of per-pixel read noise, in counts.
    pub noise_std: f64,
    /// Standard deviation of the per-frame spot jitter.
    pub jitter_px: f64,
    /// Spot drift per frame, x then y.
    pub drift_px: [f64; 2],
    /// Time between frames; zero delivers as fast as frames render.
    pub frame_interval_ms: u64,
    pub seed: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            bit_depth: 12,
            amplitude: 3000.0,
            background: 40.0,
            spot_sigma_px: 12.0,
            noise_std: 6.0,
            jitter_px: 0.05,
            drift_px: [0.002, -0.001],
            frame_interval_ms: 16,
            seed: None,
        }
    }
}

impl SimulationSettings {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.width < 3 || self.height < 3 {
            return Err(format!("sensor {}x{} is too small", self.width, self.height));
        }
        if !(1..=16).contains(&self.bit_depth) {
            return Err(format!("bit depth {} is outside 1..=16", self.bit_depth));
        }
        if !(self.spot_sigma_px > 0.0) {
            return Err("spot_sigma_px must be positive".to_string());
        }
        if !(self.amplitude > 0.0) {
            return Err("amplitude must be positive".to_string());
        }
        if !(self.noise_std >= 0.0) || !(self.jitter_px >= 0.0) {
            return Err("noise_std and jitter_px must be non-negative".to_string());
        }
        Ok(())
    }
}

/// Displaces the simulated spot from another thread.
#[derive(Debug, Clone, Default)]
pub struct BeamControl {
    offset: Arc<Mutex<AxisPair<f64>>>,
}

impl BeamControl {
    /// Set the spot offset from its drifting rest position, in pixels.
    pub fn set_offset(&self, x_px: f64, y_px: f64) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset = AxisPair::new(x_px, y_px);
    }

    pub fn offset(&self) -> AxisPair<f64> {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct SimulatedBeamSource {
    settings: SimulationSettings,
    rng: StdRng,
    noise: Normal<f64>,
    jitter: Normal<f64>,
    drift: AxisPair<f64>,
    control: BeamControl,
    frame_count: u64,
}

impl SimulatedBeamSource {
    pub fn new(settings: SimulationSettings) -> Result<Self> {
        settings.validate().map_err(Error::Config)?;
        let noise = Normal::new(0.0, settings.noise_std)
            .map_err(|e| Error::Config(format!("noise_std: {}", e)))?;
        let jitter = Normal::new(0.0, settings.jitter_px)
            .map_err(|e| Error::Config(format!("jitter_px: {}", e)))?;
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            settings,
            rng,
            noise,
            jitter,
            drift: AxisPair::default(),
            control: BeamControl::default(),
            frame_count: 0,
        })
    }

    pub fn control(&self) -> BeamControl {
        self.control.clone()
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    /// Where the next frame's spot is centred, before jitter.
    pub fn nominal_center(&self) -> AxisPair<f64> {
        let offset = self.control.offset();
        let rest = AxisPair::new(
            (self.settings.width as f64 - 1.0) / 2.0,
            (self.settings.height as f64 - 1.0) / 2.0,
        );
        AxisPair::from_fn(|axis| rest[axis] + self.drift[axis] + offset[axis])
    }

    fn render(&mut self) -> Result<Frame> {
        let s = &self.settings;
        let nominal = self.nominal_center();
        let center = AxisPair::from_fn(|axis| nominal[axis] + self.jitter.sample(&mut self.rng));

        // The spot is separable, so build both 1D shapes once.
        let shape = |axis: Axis, len: usize| -> Vec<f64> {
            let two_sigma_sq = 2.0 * s.spot_sigma_px * s.spot_sigma_px;
            (0..len)
                .map(|i| (-(i as f64 - center[axis]).powi(2) / two_sigma_sq).exp())
                .collect()
        };
        let gx = shape(Axis::X, s.width);
        let gy = shape(Axis::Y, s.height);

        let max_value = ((1u32 << s.bit_depth) - 1) as f64;
        let (amplitude, background) = (s.amplitude, s.background);
        let noise = self.noise;
        let rng = &mut self.rng;
        let pixels = Array2::from_shape_fn((s.height, s.width), |(row, col)| {
            let value = background + amplitude * gy[row] * gx[col] + noise.sample(rng);
            value.round().clamp(0.0, max_value) as u16
        });

        Frame::mono(pixels, s.bit_depth)
    }
}

impl FrameSource for SimulatedBeamSource {
    fn name(&self) -> &str {
        "simulated"
    }

    fn next_frame(&mut self, timeout: Duration) -> Result<Frame> {
        let interval = Duration::from_millis(self.settings.frame_interval_ms);
        if interval > timeout {
            thread::sleep(timeout);
            return Err(Error::AcquisitionTimeout(timeout));
        }
        if !interval.is_zero() {
            thread::sleep(interval);
        }

        let frame = self.render()?;
        self.frame_count += 1;
        for axis in Axis::BOTH {
            self.drift[axis] += self.settings.drift_px[axis as usize];
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ChannelSelector;
    use crate::processing::project;

    fn quiet_settings() -> SimulationSettings {
        SimulationSettings {
            width: 80,
            height: 60,
            noise_std: 0.0,
            jitter_px: 0.0,
            drift_px: [0.0, 0.0],
            frame_interval_ms: 0,
            seed: Some(7),
            ..SimulationSettings::default()
        }
    }

    #[test]
    fn test_spot_is_centred_and_follows_control() {
        let mut source = SimulatedBeamSource::new(quiet_settings()).unwrap();
        let frame = source.next_frame(Duration::from_millis(10)).unwrap();
        assert_eq!((frame.width(), frame.height()), (80, 60));

        let x = project(&frame, Axis::X, ChannelSelector::Mono).unwrap();
        let argmax = x.argmax().unwrap();
        assert!(argmax == 39 || argmax == 40);

        source.control().set_offset(-15.0, 5.0);
        let frame = source.next_frame(Duration::from_millis(10)).unwrap();
        let y = project(&frame, Axis::Y, ChannelSelector::Mono).unwrap();
        let argmax = y.argmax().unwrap();
        assert!(argmax == 34 || argmax == 35);
    }

    #[test]
    fn test_slow_source_times_out() {
        let settings = SimulationSettings {
            frame_interval_ms: 50,
            ..quiet_settings()
        };
        let mut source = SimulatedBeamSource::new(settings).unwrap();
        assert!(matches!(
            source.next_frame(Duration::from_millis(5)),
            Err(Error::AcquisitionTimeout(_))
        ));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = SimulationSettings {
            bit_depth: 0,
            ..quiet_settings()
        };
        assert!(matches!(SimulatedBeamSource::new(settings), Err(Error::Config(_))));
    }
}
