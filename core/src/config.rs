// Configuration management for the onion host
//
// Cross-platform config stored in:
// - macOS: ~/Library/Application Support/echalotte/config.json
// - Linux: ~/.config/echalotte/config.json
// - Windows: %APPDATA%\echalotte\config.json

use crate::message::MAX_MESSAGE_SIZE;
use crate::privacy::{CircuitError, CircuitOptions, PaddingError, RelayPadding};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default pause between two readiness attempts of the host
pub const DEFAULT_READINESS_RETRY_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to determine config directory")]
    NoConfigDir,
    #[error("config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid circuit options: {0}")]
    Circuit(#[from] CircuitError),
    #[error("invalid padding: {0}")]
    Padding(#[from] PaddingError),
    #[error("max_message_size must be greater than 0")]
    InvalidMessageSize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchalotteConfig {
    /// Circuit size and relay collection timeout
    pub circuit: CircuitOptions,

    /// Pause between two attempts at building a first circuit
    pub readiness_retry_interval: Duration,

    /// Largest onion layer accepted or sent, in bytes
    pub max_message_size: usize,

    /// Size obfuscation of discovery requests
    pub fanout_padding: RelayPadding,

    /// Size obfuscation of the number of collected candidates
    pub collection_padding: RelayPadding,
}

impl Default for EchalotteConfig {
    fn default() -> Self {
        Self {
            circuit: CircuitOptions::default(),
            readiness_retry_interval: DEFAULT_READINESS_RETRY_INTERVAL,
            max_message_size: MAX_MESSAGE_SIZE,
            fanout_padding: RelayPadding::DISCOVERY,
            collection_padding: RelayPadding::COLLECTION,
        }
    }
}

impl EchalotteConfig {
    /// Get the config directory path (cross-platform)
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("echalotte");

        std::fs::create_dir_all(&config_dir).map_err(|source| ConfigError::Io {
            path: config_dir.clone(),
            source,
        })?;

        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from the default location, or create it if missing
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_file()?)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_file()?)
    }

    /// Load config from `path`, writing the defaults there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.circuit.validate()?;
        self.fanout_padding.validate()?;
        self.collection_padding.validate()?;

        if self.max_message_size == 0 {
            return Err(ConfigError::InvalidMessageSize);
        }

        Ok(())
    }
}
