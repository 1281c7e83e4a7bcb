//! Logging configuration system
//!
//! Per-component log levels and output destinations for the measurement core.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    pub global_level: String,

    /// Enable console output
    pub console_output: bool,

    /// Directory for daily-rolled JSON log files (None = no file logging)
    pub log_directory: Option<PathBuf>,

    /// Include file location in logs
    pub include_file_location: bool,

    /// Projection and fitting
    pub processing_level: String,

    /// Zero reference, averaging and straightness
    pub measurement_level: String,

    /// Frame acquisition and the producer loop
    pub live_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            global_level: "info".to_string(),
            console_output: true,
            log_directory: None,
            include_file_location: false,
            processing_level: "info".to_string(),
            measurement_level: "info".to_string(),
            live_level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Verbose configuration for bench work at the rig
    pub fn development() -> Self {
        Self {
            global_level: "debug".to_string(),
            console_output: true,
            log_directory: Some(PathBuf::from("logs")),
            include_file_location: true,
            processing_level: "trace".to_string(),
            measurement_level: "debug".to_string(),
            live_level: "debug".to_string(),
        }
    }

    /// Validate the configuration and provide helpful error messages
    pub fn validate(&self) -> Result<(), String> {
        for (name, level) in [
            ("global_level", &self.global_level),
            ("processing_level", &self.processing_level),
            ("measurement_level", &self.measurement_level),
            ("live_level", &self.live_level),
        ] {
            if !VALID_LEVELS.contains(&level.as_str()) {
                return Err(format!(
                    "Invalid {}: {}. Must be one of: {:?}",
                    name, level, VALID_LEVELS
                ));
            }
        }

        if let Some(ref log_dir) = self.log_directory {
            if let Some(parent) = log_dir.parent().filter(|p| !p.as_os_str().is_empty()) {
                if !parent.exists() {
                    return Err(format!("Log directory parent does not exist: {:?}", parent));
                }
            }
        }

        Ok(())
    }

    /// Get the effective log level for a specific component
    pub fn get_component_level(&self, component: &str) -> &str {
        match component {
            "processing" => &self.processing_level,
            "measurement" => &self.measurement_level,
            "live" | "acquisition" => &self.live_level,
            _ => &self.global_level,
        }
    }

    /// `EnvFilter` directives for the crate and its components
    pub fn filter_directives(&self) -> String {
        let krate = env!("CARGO_PKG_NAME").replace('-', "_");
        let mut directives = vec![format!("{}={}", krate, self.global_level)];
        for component in ["processing", "measurement", "live", "acquisition"] {
            directives.push(format!(
                "{}::{}={}",
                krate,
                component,
                self.get_component_level(component)
            ));
        }
        directives.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.global_level, "info");
        assert!(config.console_output);
        assert!(config.log_directory.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = LoggingConfig::default();
        config.global_level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.global_level = "debug".to_string();
        config.measurement_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_component_level_selection() {
        let config = LoggingConfig::development();
        assert_eq!(config.get_component_level("processing"), "trace");
        assert_eq!(config.get_component_level("acquisition"), "debug");
        assert_eq!(config.get_component_level("unknown"), "debug");
    }

    #[test]
    fn test_filter_directives() {
        let directives = LoggingConfig::default().filter_directives();
        assert!(directives.starts_with("autocollimator=info"));
        assert!(directives.contains("autocollimator::processing=info"));
    }
}
