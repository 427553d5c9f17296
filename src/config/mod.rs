//! Field configuration.
//!
//! Every knob has a default so an empty JSON object is a valid config. The
//! runtime reads this once at startup and hands the pieces to whoever needs
//! them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::logging::LogLevel;
use crate::placement::Placement;

const DEFAULT_NOMINAL_WIDTH: usize = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldConfig {
    /// Maximum visible rows; unlimited when absent.
    pub viewport_rows: Option<usize>,
    /// Width used for banners.
    pub nominal_width: usize,
    pub header: BannerConfig,
    pub separator: BannerConfig,
    /// Text shown in the input area before anything is typed.
    pub prompt: String,
    pub clock: ClockConfig,
    pub goals: Option<GoalsConfig>,
    pub log: LogConfig,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            viewport_rows: None,
            nominal_width: DEFAULT_NOMINAL_WIDTH,
            header: BannerConfig {
                text: "Receptive Field".to_string(),
                fill: '*',
            },
            separator: BannerConfig {
                text: "Enter a command line or free-form text. (/Help)".to_string(),
                fill: '#',
            },
            prompt: "> ".to_string(),
            clock: ClockConfig::default(),
            goals: None,
            log: LogConfig::default(),
        }
    }
}

impl FieldConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nominal_width == 0 {
            return Err(ConfigError::Invalid {
                field: "nominal_width",
                reason: "must be > 0",
            });
        }
        if self.viewport_rows == Some(0) {
            return Err(ConfigError::Invalid {
                field: "viewport_rows",
                reason: "must be > 0 when set",
            });
        }
        if self.clock.interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "clock.interval_ms",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BannerConfig {
    pub text: String,
    pub fill: char,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    Minutes,
    Seconds,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockConfig {
    pub enabled: bool,
    pub mode: ClockMode,
    pub interval_ms: u64,
    pub placement: Placement,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: ClockMode::Minutes,
            interval_ms: 1_000,
            placement: Placement::AnchoredTop,
        }
    }
}

impl ClockConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GoalsConfig {
    pub data_dir: PathBuf,
    #[serde(default = "default_goals_file")]
    pub file: String,
    #[serde(default = "default_goals_fallback")]
    pub fallback_file: String,
    #[serde(default = "default_goals_placement")]
    pub placement: Placement,
}

fn default_goals_file() -> String {
    "cur-goals.json".to_string()
}

fn default_goals_fallback() -> String {
    "init-goals.json".to_string()
}

fn default_goals_placement() -> Placement {
    Placement::AnchoredBottom
}

impl GoalsConfig {
    pub fn primary_path(&self) -> PathBuf {
        self.data_dir.join(&self.file)
    }

    pub fn fallback_path(&self) -> PathBuf {
        self.data_dir.join(&self.fallback_file)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// JSON-lines log file; logging is off when absent.
    pub path: Option<PathBuf>,
    /// Truncate the file once it would exceed this size. Zero disables.
    pub max_bytes: u64,
    pub level: LogLevel,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_bytes: 1 << 20,
            level: LogLevel::Info,
        }
    }
}
