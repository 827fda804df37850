//! Serializable run configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use leverlab_core::{ConfigError as CoreConfigError, LedgerConfig, StrategyConfig};

/// Unique identifier for a run (content-addressable hash).
pub type RunId = String;

/// Errors loading or validating a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Core(#[from] CoreConfigError),
}

/// Data-shape settings for the bar source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    /// Bar interval in minutes; persistence streaks are measured as
    /// consecutive same-sign bars × this interval.
    pub bar_minutes: u32,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { bar_minutes: 5 }
    }
}

/// Complete configuration for a single backtest run.
///
/// Captures everything needed to reproduce the run: strategy parameters,
/// ledger parameters, starting capital, and data shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    #[serde(default)]
    pub data: DataConfig,
}

fn default_initial_capital() -> f64 {
    100_000.0
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyConfig::default(),
            ledger: LedgerConfig::default(),
            initial_capital: default_initial_capital(),
            data: DataConfig::default(),
        }
    }
}

impl RunConfig {
    /// Loads and validates a TOML config file. Missing sections fall back
    /// to defaults, so an empty file is a valid baseline config.
    pub fn from_toml_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy.validate()?;
        self.ledger.validate()?;
        if !(self.initial_capital > 0.0) || !self.initial_capital.is_finite() {
            return Err(CoreConfigError::BadInitialCapital(self.initial_capital).into());
        }
        Ok(())
    }

    /// Deterministic content hash for this configuration.
    ///
    /// Two runs with identical configs share a `RunId`, which keys sweep
    /// results and artifact filenames.
    pub fn run_id(&self) -> RunId {
        let json =
            serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"));
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}
