//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `certflow.toml` in the working directory unless another path
//! is given. Every field has a sensible default so the file is optional.
//! Environment variables take precedence over file values.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use certflow_app::discovery_coordinator::BatchLimits;

/// Default configuration file name.
pub const DEFAULT_PATH: &str = "certflow.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Discovery batch limits.
    pub batch: BatchConfig,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL.
    pub url: String,
    /// Pooled connections for file databases.
    pub max_connections: u32,
    /// Milliseconds a writer waits for the database lock.
    pub busy_timeout_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Concurrency limits for discovery batches.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub pool_width: usize,
    pub stage_permits: usize,
    pub progress_interval: u64,
}

impl Config {
    /// Load configuration from `path` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is malformed, an override
    /// is not a number, or the result fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    /// Apply overrides read through `var`. `RUST_LOG` wins over `CERTFLOW_LOG`.
    fn apply_overrides(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = var("CERTFLOW_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = var("CERTFLOW_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("CERTFLOW_POOL_WIDTH") {
            self.batch.pool_width = parse_number("CERTFLOW_POOL_WIDTH", &val)?;
        }
        if let Some(val) = var("CERTFLOW_STAGE_PERMITS") {
            self.batch.stage_permits = parse_number("CERTFLOW_STAGE_PERMITS", &val)?;
        }
        if let Some(val) = var("CERTFLOW_PROGRESS_INTERVAL") {
            self.batch.progress_interval = parse_number("CERTFLOW_PROGRESS_INTERVAL", &val)?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.batch_limits()
            .validate()
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        if self.batch.stage_permits > self.batch.pool_width {
            return Err(ConfigError::Validation(format!(
                "stage permits ({}) must not exceed pool width ({})",
                self.batch.stage_permits, self.batch.pool_width
            )));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database max_connections must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Limits handed to the discovery batch coordinator.
    #[must_use]
    pub fn batch_limits(&self) -> BatchLimits {
        BatchLimits {
            pool_width: self.batch.pool_width,
            stage_permits: self.batch.stage_permits,
            progress_interval: self.batch.progress_interval,
        }
    }

    /// Settings for the storage adapter.
    #[must_use]
    pub fn storage(&self) -> certflow_adapter_storage_sqlite_sqlx::Config {
        certflow_adapter_storage_sqlite_sqlx::Config {
            database_url: self.database.url.clone(),
            max_connections: self.database.max_connections,
            busy_timeout: Duration::from_millis(self.database.busy_timeout_ms),
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidOverride {
        name,
        value: value.to_string(),
    })
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:certflow.db".to_string(),
            max_connections: 4,
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "certflowd=info,certflow_app=info,certflow_adapter_storage_sqlite_sqlx=warn"
                .to_string(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        let limits = BatchLimits::default();
        Self {
            pool_width: limits.pool_width,
            stage_permits: limits.stage_permits,
            progress_interval: limits.progress_interval,
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
    /// An environment override that should be a number is not.
    #[error("{name} must be a non-negative number, got `{value}`")]
    InvalidOverride { name: &'static str, value: String },
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
