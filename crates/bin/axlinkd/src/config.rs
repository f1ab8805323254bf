//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `axlink.toml` in the working directory (or the path in
//! `AXLINK_CONFIG`). Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use serde::Deserialize;

use axlink_adapter_virtual::VirtualDeviceConfig;
use axlink_domain::entry::Payload;
use axlink_domain::id::EntryId;
use axlink_domain::migration::TARGET_VERSION;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Setup retry backoff.
    pub retry: RetryConfig,
    /// Config entries added to the store when missing.
    pub entries: Vec<EntrySeed>,
    /// Simulated devices answering connection attempts.
    pub devices: Vec<VirtualDeviceConfig>,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Exponential backoff between setup attempts of a `NotReady` entry.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_delay_secs: u64,
    pub max_delay_secs: u64,
}

/// A config entry declared in the file.
#[derive(Debug, Deserialize)]
pub struct EntrySeed {
    /// Stable id. Seeds without one are matched by title.
    #[serde(default)]
    pub id: Option<EntryId>,
    pub title: String,
    #[serde(default = "target_version")]
    pub version: u32,
    pub data: Payload,
}

fn target_version() -> u32 {
    TARGET_VERSION
}

impl Config {
    /// Load configuration from `AXLINK_CONFIG` or `axlink.toml` (if present)
    /// then apply environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("AXLINK_CONFIG").unwrap_or_else(|_| "axlink.toml".to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AXLINK_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("AXLINK_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.initial_delay_secs == 0 {
            return Err(ConfigError::Validation(
                "retry.initial_delay_secs must be non-zero".to_string(),
            ));
        }
        if self.retry.max_delay_secs < self.retry.initial_delay_secs {
            return Err(ConfigError::Validation(
                "retry.max_delay_secs must not be below retry.initial_delay_secs".to_string(),
            ));
        }
        if let Some(seed) = self.entries.iter().find(|seed| seed.title.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "entry {:?} needs a title",
                seed.id
            )));
        }
        Ok(())
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:axlink.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "axlinkd=info,axlink=info".to_string(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 5,
            max_delay_secs: 300,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
