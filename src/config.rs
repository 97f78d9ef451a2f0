//! Configuration for the Breather fatigue monitor.

use crate::core::baseline::{Prior, DEFAULT_VIRTUAL_SAMPLES};
use crate::core::windowing::DEFAULT_HORIZON_SECS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for the monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How often the fatigue score is sampled
    #[serde(with = "duration_serde")]
    pub sample_interval: Duration,

    /// How long sampled fatigue values are retained (in seconds)
    pub history_horizon_secs: f64,

    /// Keystroke statistics engine settings
    pub engine: EngineConfig,

    /// Score thresholds for fatigue levels
    pub levels: LevelThresholds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(5),
            history_horizon_secs: 120.0,
            engine: EngineConfig::default(),
            levels: LevelThresholds::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("breather")
            .join("config.json")
    }
}

/// Settings of the keystroke statistics engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Horizon of the recent-behaviour windows (in seconds)
    pub window_horizon_secs: f64,
    /// Release-to-press gaps at or above this are pauses, not flight time
    pub max_flight_secs: f64,
    /// Holds at or above this are held keys, not keystroke dynamics
    pub max_hold_secs: f64,
    /// Press gaps above this split typing runs for WPM
    pub wpm_pause_secs: f64,
    /// Pseudo-observations backing every baseline prior
    pub virtual_samples: u64,
    /// Real observations a baseline needs before lifetime values are reported
    pub lifetime_min_observations: u64,
    pub priors: BaselinePriors,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_horizon_secs: DEFAULT_HORIZON_SECS,
            max_flight_secs: 1.0,
            max_hold_secs: 0.5,
            wpm_pause_secs: 5.0,
            virtual_samples: DEFAULT_VIRTUAL_SAMPLES,
            lifetime_min_observations: 200,
            priors: BaselinePriors::default(),
        }
    }
}

/// Population priors (mean, variance) for each baselined metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselinePriors {
    pub hold: Prior,
    pub flight: Prior,
    /// Fraction of presses that are backspace
    pub backspace: Prior,
    pub pre_correction: Prior,
    pub latency: Prior,
    pub wpm: Prior,
}

impl Default for BaselinePriors {
    fn default() -> Self {
        Self {
            hold: Prior::new(0.10, 0.0025),
            flight: Prior::new(0.20, 0.01),
            backspace: Prior::new(0.05, 0.0475),
            pre_correction: Prior::new(0.50, 0.25),
            latency: Prior::new(0.15, 0.01),
            wpm: Prior::new(40.0, 225.0),
        }
    }
}

/// Upper bounds of the composite score for each fatigue level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LevelThresholds {
    pub rested_below: f64,
    pub normal_below: f64,
    pub tired_below: f64,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            rested_below: -1.0,
            normal_below: 1.5,
            tired_below: 3.0,
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
