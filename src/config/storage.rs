//! Local storage configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Default key-value file holding the configured region list.
pub const DEFAULT_ENV_FILE: &str = ".env.local";
/// Default key under which the region list is stored.
pub const DEFAULT_REGION_KEY: &str = "AWS_REGIONS";
/// Default discovery cache document.
pub const DEFAULT_CACHE_FILE: &str = ".discovery-cache.json";
/// Default retention window for the discovery cache record.
pub const DEFAULT_CACHE_RETENTION_DAYS: u32 = 30;

/// Where the region configuration and the discovery cache live.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Flat `KEY=value` text file holding the region list.
    pub env_file: PathBuf,
    /// Key of the region list line inside `env_file`.
    pub region_key: String,
    /// JSON document holding the discovery cache slot.
    pub cache_file: PathBuf,
    /// Records older than this many days are removed by cache cleanup.
    pub cache_retention_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
            region_key: DEFAULT_REGION_KEY.to_string(),
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
            cache_retention_days: DEFAULT_CACHE_RETENTION_DAYS,
        }
    }
}
