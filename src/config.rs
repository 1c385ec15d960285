//! Configuration management module.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration load result.
#[derive(Debug)]
pub enum ConfigLoadResult {
    /// Config loaded successfully.
    Loaded(AppConfig),
    /// Config file missing (first run).
    Missing,
    /// Config file exists but invalid.
    Invalid(ConfigError),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Driver configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub device: DeviceConfig,
    pub account: AccountConfig,
    #[serde(default)]
    pub repeat: RepeatConfig,
}

/// Appliance connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Device id carried in every command frame.
    pub id: u32,
    /// Connect and write timeout in seconds (default: 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_secs() -> u64 {
    10
}

/// Account credentials used for the login frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    pub user_id: u32,
    pub authorize: String,
    /// When the authorization stops being accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Repeat scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepeatConfig {
    /// Pause between cycles when a command does not specify one.
    #[serde(default = "default_wait_ms")]
    pub default_wait_ms: u64,
}

fn default_wait_ms() -> u64 {
    300
}

impl AppConfig {
    /// Per-user config file path, falling back to the working directory.
    pub fn default_path() -> PathBuf {
        ProjectDirs::from("", "", "ergowifi")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Attempt to load config with detailed result.
    pub fn try_load(path: &Path) -> ConfigLoadResult {
        if !path.exists() {
            return ConfigLoadResult::Missing;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<AppConfig>(&content) {
                Ok(config) => match config.validate() {
                    Ok(()) => ConfigLoadResult::Loaded(config),
                    Err(e) => ConfigLoadResult::Invalid(e),
                },
                Err(e) => ConfigLoadResult::Invalid(ConfigError::Parse(e)),
            },
            Err(e) => ConfigLoadResult::Invalid(ConfigError::Read(e)),
        }
    }

    /// Load config, treating a missing file as an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match Self::try_load(path) {
            ConfigLoadResult::Loaded(config) => Ok(config),
            ConfigLoadResult::Missing => Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                path.display()
            ))),
            ConfigLoadResult::Invalid(e) => Err(e),
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.host.trim().is_empty() {
            return Err(ConfigError::Validation("Device host cannot be empty".to_string()));
        }
        if self.device.port == 0 {
            return Err(ConfigError::Validation("Device port must be greater than 0".to_string()));
        }
        if self.device.timeout_secs == 0 {
            return Err(ConfigError::Validation("Timeout must be at least 1 second".to_string()));
        }
        if self.repeat.default_wait_ms == 0 {
            return Err(ConfigError::Validation(
                "Default repeat wait must be at least 1 ms".to_string(),
            ));
        }
        if self.account.authorize.len() > u16::MAX as usize {
            return Err(ConfigError::Validation("Authorize token is too long".to_string()));
        }
        Ok(())
    }

    /// Save configuration to file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.50".to_string(),
            port: default_port(),
            id: 0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for RepeatConfig {
    fn default() -> Self {
        Self {
            default_wait_ms: default_wait_ms(),
        }
    }
}
