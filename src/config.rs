//! Engine configuration
//!
//! Loaded from a JSON file; every field has a default so a partial file is
//! valid.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};

/// Smallest accepted render quantum
const MIN_BLOCK_SIZE: usize = 64;

/// Largest accepted render quantum
const MAX_BLOCK_SIZE: usize = 8192;

/// Live output backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Headless output that paces rendering in real time and discards samples
    #[default]
    Null,
    /// System output device (requires the `device` feature)
    Device,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Render quantum in frames; also the convolver partition size
    pub block_size: usize,
    /// Length of the visualization tap window
    pub tap_window: usize,
    /// Host polling cadence in milliseconds
    pub poll_interval_ms: u64,
    /// Seed for the reverb impulse; fresh randomness when absent
    pub impulse_seed: Option<u64>,
    /// Sample rate of the headless output
    pub live_sample_rate: u32,
    /// Channel count of the headless output
    pub live_channels: usize,
    /// Which live output to open
    pub output: OutputKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_size: 512,
            tap_window: 2048,
            poll_interval_ms: 16,
            impulse_seed: None,
            live_sample_rate: 44100,
            live_channels: 2,
            output: OutputKind::Null,
        }
    }
}

impl EngineConfig {
    /// Load and validate a configuration file
    ///
    /// # Errors
    /// * `Io` - If the file cannot be read
    /// * `Serialization` - If the file is not valid JSON
    /// * `InvalidConfig` - If a value is out of range
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse and validate a configuration from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that all values are usable
    pub fn validate(&self) -> Result<()> {
        if !self.block_size.is_power_of_two()
            || self.block_size < MIN_BLOCK_SIZE
            || self.block_size > MAX_BLOCK_SIZE
        {
            return Err(StudioError::InvalidConfig {
                reason: format!(
                    "block_size {} must be a power of two between {} and {}",
                    self.block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE
                ),
            });
        }
        if self.tap_window == 0 {
            return Err(StudioError::InvalidConfig {
                reason: "tap_window must be non-zero".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(StudioError::InvalidConfig {
                reason: "poll_interval_ms must be non-zero".to_string(),
            });
        }
        if self.live_sample_rate == 0 {
            return Err(StudioError::InvalidConfig {
                reason: "live_sample_rate must be non-zero".to_string(),
            });
        }
        if self.live_channels == 0 {
            return Err(StudioError::InvalidConfig {
                reason: "live_channels must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{ "impulse_seed": 7, "output": "null" }"#).unwrap();
        assert_eq!(config.impulse_seed, Some(7));
        assert_eq!(config.block_size, 512);
        assert_eq!(config.tap_window, 2048);
    }

    #[test]
    fn test_rejects_bad_block_size() {
        let err = EngineConfig::from_json(r#"{ "block_size": 500 }"#).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_rejects_zero_poll_interval() {
        let err = EngineConfig::from_json(r#"{ "poll_interval_ms": 0 }"#).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "block_size": 256, "live_channels": 1 }}"#).unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.block_size, 256);
        assert_eq!(config.live_channels, 1);
    }
}
