//! Once-per-day record of the billed discovery call.
//!
//! The cache document is a single JSON object with a closed set of named
//! slots; today only [`LAST_EXECUTION_SLOT`] exists. The slot holds at most
//! one [`DiscoveryRecord`] and is overwritten in place:
//!
//! ```text
//! Absent --save_execution--> Present(count=1) --check_today_execution--> Present(count=n+1)
//! ```
//!
//! A record whose `dateKey` is not today is treated as absent. It stays on
//! disk until the next save overwrites it or [`DiscoveryCache::cleanup`]
//! removes it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};

use super::{write_atomic, Result, StoreError};
use crate::region::{self, RegionSet};
use crate::utils::clock::{Clock, SystemClock};

/// Name of the slot holding the most recent discovery record.
pub const LAST_EXECUTION_SLOT: &str = "lastExecution";

/// `chrono` format of `dateKey`.
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// One billed discovery run and how often it was reused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryRecord {
    pub date_key: String,
    pub timestamp_utc: DateTime<Utc>,
    #[serde(deserialize_with = "crate::region::deserialize_lenient")]
    pub regions: RegionSet,
    pub execution_time_ms: u64,
    pub cost_incurred: f64,
    pub request_count: u32,
}

impl DiscoveryRecord {
    /// Number of requests answered from this record instead of a new call.
    pub fn prevented_duplicates(&self) -> u32 {
        self.request_count.saturating_sub(1)
    }

    fn date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date_key, DATE_KEY_FORMAT).ok()
    }
}

/// On-disk cache document.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_execution: Option<DiscoveryRecord>,
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// 0 or 1: the cache keeps a single slot.
    pub total_executions: u32,
    pub total_cost: f64,
    pub average_execution_time_ms: f64,
    pub prevented_duplicates: u32,
    pub last_execution_timestamp: Option<DateTime<Utc>>,
}

/// Result of a structural check of the cache document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheValidation {
    pub is_valid: bool,
    pub issues: Vec<String>,
}

impl CacheValidation {
    fn from_issues(issues: Vec<String>) -> Self {
        Self {
            is_valid: issues.is_empty(),
            issues,
        }
    }
}

/// Owns the persisted discovery record slot.
pub struct DiscoveryCache {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl DiscoveryCache {
    /// Create a cache backed by the JSON document at `path`.
    pub fn new(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            clock,
        }
    }

    /// Create a cache that uses the system clock.
    pub fn with_system_clock(path: impl AsRef<Path>) -> Self {
        Self::new(path, Arc::new(SystemClock))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn today_key(&self) -> String {
        self.clock.today().format(DATE_KEY_FORMAT).to_string()
    }

    /// Load the stored record regardless of its date.
    ///
    /// A missing or unparseable document is treated as no record.
    pub async fn load(&self) -> Result<Option<DiscoveryRecord>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        match serde_json::from_str::<CacheDocument>(&contents) {
            Ok(doc) => Ok(doc.last_execution),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Discovery cache is unreadable, ignoring it");
                Ok(None)
            }
        }
    }

    async fn store(&self, record: Option<DiscoveryRecord>) -> Result<()> {
        let doc = CacheDocument {
            last_execution: record,
        };
        let json = serde_json::to_vec_pretty(&doc)?;
        write_atomic(&self.path, &json).await
    }

    /// Return today's record without counting the request.
    pub async fn peek_today(&self) -> Result<Option<DiscoveryRecord>> {
        let today = self.today_key();
        Ok(self.load().await?.filter(|r| r.date_key == today))
    }

    /// Return today's record, counting this request against it.
    ///
    /// Increments and persists `requestCount` when a record for today
    /// exists. Returns `None` and writes nothing otherwise.
    pub async fn check_today_execution(&self) -> Result<Option<DiscoveryRecord>> {
        let Some(mut record) = self.peek_today().await? else {
            return Ok(None);
        };
        record.request_count = record.request_count.saturating_add(1);
        self.store(Some(record.clone())).await?;
        info!(
            date = %record.date_key,
            request_count = record.request_count,
            prevented = record.prevented_duplicates(),
            "Serving discovery from today's cache"
        );
        Ok(Some(record))
    }

    /// Overwrite the slot with a fresh record for today.
    pub async fn save_execution(
        &self,
        regions: RegionSet,
        execution_time_ms: u64,
        cost_incurred: f64,
    ) -> Result<DiscoveryRecord> {
        let record = DiscoveryRecord {
            date_key: self.today_key(),
            timestamp_utc: self.clock.now(),
            regions,
            execution_time_ms,
            cost_incurred: cost_incurred.max(0.0),
            request_count: 1,
        };
        self.store(Some(record.clone())).await?;
        debug!(path = %self.path.display(), date = %record.date_key, "Saved discovery execution");
        Ok(record)
    }

    /// Statistics over the stored record.
    pub async fn stats(&self) -> Result<CacheStats> {
        let stats = match self.load().await? {
            Some(record) => CacheStats {
                total_executions: 1,
                total_cost: record.cost_incurred,
                average_execution_time_ms: record.execution_time_ms as f64,
                prevented_duplicates: record.prevented_duplicates(),
                last_execution_timestamp: Some(record.timestamp_utc),
            },
            None => CacheStats {
                total_executions: 0,
                total_cost: 0.0,
                average_execution_time_ms: 0.0,
                prevented_duplicates: 0,
                last_execution_timestamp: None,
            },
        };
        Ok(stats)
    }

    /// True if any record is stored, whatever its date.
    pub async fn exists(&self) -> bool {
        matches!(self.load().await, Ok(Some(_)))
    }

    /// Remove the cache document.
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    /// Remove the stored record if it is older than `retention_days`.
    ///
    /// Returns true when a record was removed. Records with an unparseable
    /// date are removed as well.
    pub async fn cleanup(&self, retention_days: u32) -> Result<bool> {
        let Some(record) = self.load().await? else {
            return Ok(false);
        };
        let expired = match record.date() {
            Some(date) => (self.clock.today() - date).num_days() > i64::from(retention_days),
            None => true,
        };
        if expired {
            info!(date = %record.date_key, retention_days, "Removing expired discovery record");
            self.store(None).await?;
        }
        Ok(expired)
    }

    /// Structural check of the raw cache document.
    pub async fn validate(&self) -> Result<CacheValidation> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(CacheValidation::from_issues(Vec::new()))
            }
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        let doc: Value = match serde_json::from_str(&contents) {
            Ok(doc) => doc,
            Err(e) => {
                return Ok(CacheValidation::from_issues(vec![format!(
                    "document is not valid JSON: {}",
                    e
                )]))
            }
        };
        Ok(CacheValidation::from_issues(validate_document(&doc)))
    }
}

fn validate_document(doc: &Value) -> Vec<String> {
    let Some(slots) = doc.as_object() else {
        return vec!["document must be a JSON object".to_string()];
    };

    let mut issues = Vec::new();
    for name in slots.keys() {
        if name != LAST_EXECUTION_SLOT {
            issues.push(format!("unknown slot: {}", name));
        }
    }

    let Some(record) = slots.get(LAST_EXECUTION_SLOT) else {
        return issues;
    };
    let Some(record) = record.as_object() else {
        issues.push(format!("{} must be an object", LAST_EXECUTION_SLOT));
        return issues;
    };

    match record.get("dateKey").and_then(Value::as_str) {
        Some(key) if NaiveDate::parse_from_str(key, DATE_KEY_FORMAT).is_ok() => {}
        _ => issues.push("dateKey must be a YYYY-MM-DD date".to_string()),
    }
    match record.get("timestampUtc").and_then(Value::as_str) {
        Some(ts) if DateTime::parse_from_rfc3339(ts).is_ok() => {}
        _ => issues.push("timestampUtc must be an RFC 3339 timestamp".to_string()),
    }
    for field in ["executionTimeMs", "costIncurred"] {
        match record.get(field).and_then(Value::as_f64) {
            Some(v) if v >= 0.0 => {}
            _ => issues.push(format!("{} must be a non-negative number", field)),
        }
    }
    match record.get("regions").and_then(Value::as_array) {
        Some(items) if items.iter().all(Value::is_string) => {
            for token in items.iter().filter_map(Value::as_str) {
                if !region::is_valid(token) {
                    issues.push(format!("regions contains unknown region: {}", token));
                }
            }
        }
        Some(_) => issues.push("regions must contain only strings".to_string()),
        None => issues.push("regions must be an array".to_string()),
    }
    match record.get("requestCount").and_then(Value::as_u64) {
        Some(n) if n >= 1 => {}
        _ => issues.push("requestCount must be an integer >= 1".to_string()),
    }
    issues
}
