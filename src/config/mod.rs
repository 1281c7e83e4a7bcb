use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::acquisition::SimulationSettings;
use crate::frame::ChannelSelector;
use crate::logging::LoggingConfig;
use crate::measurement::OverflowPolicy;
use crate::processing::{CalibrationConverter, FitSettings, ProcessorKind};
use crate::{Error, Result};

pub mod units;

pub use units::{parse_length_m, seconds};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub optics: OpticsConfig,
    pub processing: ProcessingConfig,
    pub acquisition: AcquisitionConfig,
    pub history: HistoryConfig,
    pub averaging: AveragingConfig,
    pub straightness: StraightnessConfig,
    pub display: DisplayConfig,
    pub logging: LoggingConfig,
}

/// Optical constants, written with units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpticsConfig {
    pub pixel_pitch: String,
    pub focal_length: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProcessingConfig {
    pub processor: ProcessorKind,
    pub channel: ChannelSelector,
    pub fit: FitSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub frame_timeout_ms: u64,
    pub simulation: SimulationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
    pub overflow: OverflowPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AveragingConfig {
    pub default_duration_s: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StraightnessConfig {
    pub default_increment_m: f64,
    pub default_timeframe_s: f64,
    pub stall_timeout_ms: u64,
    pub subscriber_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub refresh_interval_ms: u64,
    pub fps_window_s: f64,
    /// Newest history points per axis copied into each display snapshot.
    pub history_points: usize,
}

impl Default for OpticsConfig {
    fn default() -> Self {
        Self {
            pixel_pitch: "5.86 um".to_string(),
            focal_length: "300 mm".to_string(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            frame_timeout_ms: 5000,
            simulation: SimulationSettings::default(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            // ten minutes at 60 fps
            capacity: 36_000,
            overflow: OverflowPolicy::DropOldest,
        }
    }
}

impl Default for AveragingConfig {
    fn default() -> Self {
        Self {
            default_duration_s: 3.0,
        }
    }
}

impl Default for StraightnessConfig {
    fn default() -> Self {
        Self {
            default_increment_m: 0.1,
            default_timeframe_s: 3.0,
            stall_timeout_ms: 5000,
            subscriber_capacity: 1024,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 40,
            fps_window_s: 3.0,
            history_points: 2000,
        }
    }
}

impl OpticsConfig {
    pub fn pixel_pitch_m(&self) -> Result<f64> {
        parse_length_m(&self.pixel_pitch)
    }

    pub fn focal_length_m(&self) -> Result<f64> {
        parse_length_m(&self.focal_length)
    }

    /// Pixel to arcsecond conversion for these optics.
    pub fn converter(&self) -> Result<CalibrationConverter> {
        let pitch = self.pixel_pitch_m()?;
        let focal = self.focal_length_m()?;
        if pitch <= 0.0 || focal <= 0.0 {
            return Err(Error::Config(format!(
                "pixel pitch ({}) and focal length ({}) must be positive",
                self.pixel_pitch, self.focal_length
            )));
        }
        Ok(CalibrationConverter::from_optics(pitch, focal))
    }
}

impl AcquisitionConfig {
    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }
}

impl AveragingConfig {
    pub fn default_duration(&self) -> Result<Duration> {
        seconds("averaging.default_duration_s", self.default_duration_s)
    }
}

impl StraightnessConfig {
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }
}

impl DisplayConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn fps_window(&self) -> Result<Duration> {
        seconds("display.fps_window_s", self.fps_window_s)
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;

        if content.trim_start().starts_with('{') {
            serde_json::from_str(&content).map_err(|e| Error::Config(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P, format: ConfigFormat) -> Result<()> {
        let content = match format {
            ConfigFormat::Json => {
                serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?
            }
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?
            }
        };

        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.optics.converter() {
            errors.push(format!("Optics: {}", e));
        }

        if self.processing.fit.max_iterations == 0 {
            errors.push("Fit max_iterations must be positive".to_string());
        }

        if !(self.processing.fit.initial_sigma_px > 0.0) {
            errors.push("Fit initial_sigma_px must be positive".to_string());
        }

        if !(self.processing.fit.tolerance > 0.0) {
            errors.push("Fit tolerance must be positive".to_string());
        }

        if self.acquisition.frame_timeout_ms == 0 {
            errors.push("Acquisition frame_timeout_ms must be positive".to_string());
        }

        if let Err(e) = self.acquisition.simulation.validate() {
            errors.push(format!("Simulation: {}", e));
        }

        if self.history.capacity == 0 {
            errors.push("History capacity must be positive".to_string());
        }

        if !positive_seconds(self.averaging.default_duration_s) {
            errors.push("Averaging default_duration_s must be a positive number of seconds".to_string());
        }

        if !(self.straightness.default_increment_m.is_finite() && self.straightness.default_increment_m > 0.0) {
            errors.push("Straightness default_increment_m must be positive and finite".to_string());
        }

        if !positive_seconds(self.straightness.default_timeframe_s) {
            errors.push("Straightness default_timeframe_s must be a positive number of seconds".to_string());
        }

        if self.straightness.subscriber_capacity == 0 {
            errors.push("Straightness subscriber_capacity must be positive".to_string());
        }

        if self.straightness.stall_timeout_ms == 0 {
            errors.push("Straightness stall_timeout_ms must be positive".to_string());
        }

        if !positive_seconds(self.display.fps_window_s) {
            errors.push("Display fps_window_s must be a positive number of seconds".to_string());
        }

        if self.display.history_points == 0 {
            errors.push("Display history_points must be positive".to_string());
        }

        if let Err(e) = self.logging.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn positive_seconds(secs: f64) -> bool {
    secs > 0.0 && seconds("", secs).is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Guess the format from a file extension, defaulting to TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

pub fn load_config_or_default(config_path: Option<&Path>) -> Config {
    match config_path {
        Some(path) => match Config::load_from_file(path) {
            Ok(config) => {
                if let Err(errors) = config.validate() {
                    for error in &errors {
                        tracing::warn!(path = %path.display(), "Configuration error: {}", error);
                    }
                    tracing::warn!("Using default configuration instead");
                    Config::default()
                } else {
                    config
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        },
        None => Config::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        let factor = config.optics.converter().unwrap().factor();
        assert!((factor - 2.0145).abs() < 1e-3);
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let mut config = Config::default();
        config.optics.focal_length = "0 mm".to_string();
        config.history.capacity = 0;
        config.straightness.default_timeframe_s = -1.0;
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_infinite_durations_fail_validation() {
        let mut config = Config::default();
        config.display.fps_window_s = f64::INFINITY;
        config.averaging.default_duration_s = f64::INFINITY;
        config.straightness.default_timeframe_s = f64::NAN;
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);

        assert!(matches!(
            config.display.fps_window(),
            Err(Error::InvalidInput { field: "display.fps_window_s", .. })
        ));
        assert!(config.averaging.default_duration().is_err());
    }

    #[test]
    fn test_round_trip_both_formats() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.processing.channel = ChannelSelector::Channel(2);
        config.history.overflow = OverflowPolicy::DropNewest;

        for (name, format) in [("c.toml", ConfigFormat::Toml), ("c.json", ConfigFormat::Json)] {
            let path = dir.path().join(name);
            config.save_to_file(&path, format).unwrap();
            assert_eq!(ConfigFormat::from_path(&path), format);
            assert_eq!(Config::load_from_file(&path).unwrap(), config);
        }
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(
            &path,
            "[optics]\nfocal_length = \"500 mm\"\n\n[history]\ncapacity = 10\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert!((config.optics.focal_length_m().unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(config.optics.pixel_pitch, "5.86 um");
        assert_eq!(config.history.capacity, 10);
        assert_eq!(config.acquisition.frame_timeout_ms, 5000);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[history]\ncapacity = 0\n").unwrap();
        assert_eq!(load_config_or_default(Some(&path)), Config::default());

        let missing = dir.path().join("missing.toml");
        assert_eq!(load_config_or_default(Some(&missing)), Config::default());
    }
}
