//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod discovery;
mod storage;

pub use discovery::{DiscoveryConfig, InventoryConfig, DEFAULT_COST_PER_REQUEST};
pub use storage::{
    StorageConfig, DEFAULT_CACHE_FILE, DEFAULT_CACHE_RETENTION_DAYS, DEFAULT_ENV_FILE,
    DEFAULT_REGION_KEY,
};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "regionscope.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "REGIONSCOPE_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "REGIONSCOPE";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "REGIONSCOPE_LOG";

use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local storage locations.
    pub storage: StorageConfig,
    /// Region discovery settings.
    pub discovery: DiscoveryConfig,
    /// Inventory aggregation settings.
    pub inventory: InventoryConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `regionscope.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix and `__` separator
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.region_key.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.region_key is empty".into()));
        }
        if self.storage.region_key.contains('=') {
            return Err(ConfigError::Invalid(
                "storage.region_key must not contain '='".into(),
            ));
        }
        if self.discovery.lookback_months == 0 {
            return Err(ConfigError::Invalid(
                "discovery.lookback_months must be at least 1".into(),
            ));
        }
        let cost = self.discovery.cost_per_request;
        if cost.is_nan() || cost < 0.0 {
            return Err(ConfigError::Invalid(
                "discovery.cost_per_request must be non-negative".into(),
            ));
        }
        self.discovery
            .retry
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("discovery.retry: {}", e)))?;
        self.inventory
            .retry
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("inventory.retry: {}", e)))?;
        Ok(())
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}
