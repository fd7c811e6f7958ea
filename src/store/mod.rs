//! Local persistence for the configured region set and the discovery cache.
//!
//! Two independent single-file stores:
//!
//! - [`ConfigStore`] - the region list, kept as one `KEY=a,b,c` line inside a
//!   flat key-value text file shared with other settings
//! - [`DiscoveryCache`] - a JSON document with one slot for the most recent
//!   billed discovery run
//!
//! Neither store reads the other's file. Writes go through a temp file and a
//! rename so a crash never leaves a half-written document behind. Both stores
//! assume a single writer at a time.

mod config_store;
mod discovery_cache;

pub use config_store::{ConfigComparison, ConfigStore};
pub use discovery_cache::{
    CacheStats, CacheValidation, DiscoveryCache, DiscoveryRecord, DATE_KEY_FORMAT,
    LAST_EXECUTION_SLOT,
};

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;

use crate::errors::{classify_config_error, ErrorCode, ErrorDescriptor};

/// Errors that can occur during local store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// User-facing description of this failure.
    pub fn descriptor(&self) -> ErrorDescriptor {
        match self {
            StoreError::Io { source, .. } => classify_config_error(source),
            StoreError::Serialization(e) => ErrorDescriptor::new(
                ErrorCode::Unclassified,
                format!("Failed to encode stored document: {}", e),
                "Report this as a bug; the stored document was left untouched",
                false,
            ),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Write `contents` to `path` atomically using temp file + rename.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    fs::write(&temp_path, contents)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(StoreError::io(path, e));
    }
    Ok(())
}
