//! Configuration for the simulation kernel.
//!
//! Front ends describe run parameters declaratively in YAML or JSON:
//!
//! ```yaml
//! simulation:
//!   stop_time: 1000.0
//!   log_level: info
//!
//! kernel:
//!   allow_undriven: false
//!   top_paths: 10
//! ```
//!
//! `stop_time` is the horizon used by `Network::run_to_stop`, and
//! `log_level` feeds `init_logging` when no `RUST_LOG` override is set.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::types::SimTime;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown file format: {0}")]
    UnknownFormat(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Global run parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Stop time used by `Network::run_to_stop` (nanoseconds).
    #[serde(default = "default_stop_time")]
    pub stop_time: SimTime,

    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_stop_time() -> SimTime {
    1000.0
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            stop_time: default_stop_time(),
            log_level: default_log_level(),
        }
    }
}

/// Kernel-level knobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KernelParams {
    /// Tolerate nodes with no driver (they float at Z) instead of failing
    /// finalization.
    #[serde(default)]
    pub allow_undriven: bool,

    /// How many critical paths a timing report carries.
    #[serde(default = "default_top_paths")]
    pub top_paths: usize,
}

fn default_top_paths() -> usize {
    10
}

impl Default for KernelParams {
    fn default() -> Self {
        Self {
            allow_undriven: false,
            top_paths: default_top_paths(),
        }
    }
}

/// Complete kernel configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SimConfig {
    /// Global run parameters
    #[serde(default)]
    pub simulation: SimulationParams,

    /// Kernel knobs
    #[serde(default)]
    pub kernel: KernelParams,
}

impl SimConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Loads configuration from a JSON string.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file, auto-detecting format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            _ => Err(ConfigError::UnknownFormat(ext.to_string())),
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.simulation.stop_time.is_finite() || self.simulation.stop_time <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "stop_time must be positive and finite, got {}",
                self.simulation.stop_time
            )));
        }
        match self.simulation.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::Validation(format!(
                    "unknown log level '{}'",
                    other
                )));
            }
        }
        if self.kernel.top_paths == 0 {
            return Err(ConfigError::Validation(
                "top_paths must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Converts to YAML string.
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Converts to JSON string.
    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Saves configuration to a YAML file.
    pub fn to_yaml_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }
}

/// Builder for creating SimConfig programmatically.
#[derive(Default)]
pub struct SimConfigBuilder {
    config: SimConfig,
}

impl SimConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default stop time.
    pub fn stop_time(mut self, time: SimTime) -> Self {
        self.config.simulation.stop_time = time;
        self
    }

    /// Sets the log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.simulation.log_level = level.into();
        self
    }

    /// Tolerates undriven nodes at finalize.
    pub fn allow_undriven(mut self, allow: bool) -> Self {
        self.config.kernel.allow_undriven = allow;
        self
    }

    /// Sets the number of critical paths in timing reports.
    pub fn top_paths(mut self, count: usize) -> Self {
        self.config.kernel.top_paths = count;
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> ConfigResult<SimConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimConfig::new();
        assert_eq!(config.simulation.stop_time, 1000.0);
        assert!(!config.kernel.allow_undriven);
        assert_eq!(config.kernel.top_paths, 10);
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
simulation:
  stop_time: 5000.0
  log_level: debug

kernel:
  allow_undriven: true
  top_paths: 3
"#;
        let config = SimConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.simulation.stop_time, 5000.0);
        assert_eq!(config.simulation.log_level, "debug");
        assert!(config.kernel.allow_undriven);
        assert_eq!(config.kernel.top_paths, 3);
    }

    #[test]
    fn test_json_parsing() {
        let json = r#"{
            "simulation": { "stop_time": 250.5 },
            "kernel": { "top_paths": 1 }
        }"#;
        let config = SimConfig::from_json(json).unwrap();
        assert_eq!(config.simulation.stop_time, 250.5);
        assert_eq!(config.kernel.top_paths, 1);
    }

    #[test]
    fn test_builder() {
        let config = SimConfigBuilder::new()
            .stop_time(2000.0)
            .log_level("warn")
            .allow_undriven(true)
            .top_paths(5)
            .build()
            .unwrap();
        assert_eq!(config.simulation.stop_time, 2000.0);
        assert!(config.kernel.allow_undriven);
    }

    #[test]
    fn test_validation_bad_stop_time() {
        let yaml = "simulation:\n  stop_time: -1.0\n";
        assert!(SimConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_validation_bad_log_level() {
        let yaml = "simulation:\n  log_level: loud\n";
        assert!(SimConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_validation_zero_top_paths() {
        let result = SimConfigBuilder::new().top_paths(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = SimConfigBuilder::new().stop_time(123.0).build().unwrap();
        let yaml = config.to_yaml().unwrap();
        let restored = SimConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.simulation.stop_time, restored.simulation.stop_time);
    }
}
