//! # Configuration
//!
//! Timing and auto-start settings for the playback machine.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration parameters for playback.
///
/// All delays are in milliseconds so the struct reads naturally from YAML.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Hold between `EXECUTION_STARTED` and the first `STEP_RUNNING`. Default: 50ms.
    pub start_delay_ms: u64,
    /// How long a running step animates before completing. Default: 1000ms.
    pub step_hold_ms: u64,
    /// Pause after a completed step before the next one starts. Default: 2000ms.
    pub advance_delay_ms: u64,
    /// Delay before auto-start fires. Default: 400ms.
    pub auto_start_delay_ms: u64,
    /// Auto-start delay when reduced motion is preferred. Default: 100ms.
    pub reduced_motion_auto_start_delay_ms: u64,
    /// Start playback automatically once steps are available. Default: false.
    pub auto_start: bool,
    /// The user or environment prefers reduced motion. Default: false.
    pub prefers_reduced_motion: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            start_delay_ms: 50,
            step_hold_ms: 1000,
            advance_delay_ms: 2000,
            auto_start_delay_ms: 400,
            reduced_motion_auto_start_delay_ms: 100,
            auto_start: false,
            prefers_reduced_motion: false,
        }
    }
}

impl PlaybackConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn auto_start_delay(&self) -> Duration {
        if self.prefers_reduced_motion {
            Duration::from_millis(self.reduced_motion_auto_start_delay_ms)
        } else {
            Duration::from_millis(self.auto_start_delay_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config =
            PlaybackConfig::from_yaml_str("auto_start: true\nstep_hold_ms: 250\n").unwrap();
        assert!(config.auto_start);
        assert_eq!(config.step_hold_ms, 250);
        assert_eq!(config.advance_delay_ms, 2000);
    }

    #[test]
    fn test_reduced_motion_shortens_auto_start() {
        let mut config = PlaybackConfig::default();
        assert_eq!(config.auto_start_delay(), Duration::from_millis(400));
        config.prefers_reduced_motion = true;
        assert_eq!(config.auto_start_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_invalid_yaml_is_reported() {
        assert!(PlaybackConfig::from_yaml_str("step_hold_ms: [1, 2]").is_err());
    }
}
