//! Operations exposed to the API layer.
//!
//! [`RegionService`] owns both local stores and coordinates them with the
//! discoverer and the aggregator. It is the only place that reads the config
//! store and the discovery cache together.

mod error;

pub use error::ServiceError;

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::discovery::{DetectionResult, RegionDiscoverer, UsageSource};
use crate::errors::ErrorDescriptor;
use crate::inventory::{
    filter_active, statistics, InventoryItem, InventorySource, InventoryStatistics,
    MultiRegionAggregator,
};
use crate::region::{RegionId, RegionSet};
use crate::store::{
    CacheStats, CacheValidation, ConfigComparison, ConfigStore, DiscoveryCache, DiscoveryRecord,
    StoreError,
};
use crate::utils::clock::Clock;

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Result of [`RegionService::discover`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryOutcome {
    pub regions: RegionSet,
    /// True when today's record was reused and no billed call was made.
    pub from_cache: bool,
    pub record: DiscoveryRecord,
    /// Present only for fresh runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<DetectionResult>,
    pub comparison: ConfigComparison,
    pub config_updated: bool,
    pub prevented_duplicates: u32,
}

/// A region with its human-readable name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSummary {
    pub id: RegionId,
    pub display_name: &'static str,
}

impl From<&RegionId> for RegionSummary {
    fn from(region: &RegionId) -> Self {
        Self {
            id: region.clone(),
            display_name: region.display_name(),
        }
    }
}

/// Result of [`RegionService::status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub configured_regions: Vec<RegionSummary>,
    pub discovered_today: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub today: Option<DiscoveryRecord>,
    pub cache: CacheStats,
    pub cache_validation: CacheValidation,
}

/// A region that failed during an inventory fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionFailure {
    pub region: RegionId,
    pub error: ErrorDescriptor,
}

/// Result of [`RegionService::fetch_inventory`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryReport {
    pub regions: RegionSet,
    pub items: Vec<InventoryItem>,
    pub statistics: InventoryStatistics,
    pub active_count: usize,
    pub failures: Vec<RegionFailure>,
}

/// Discovery, reconciliation and inventory behind one handle.
pub struct RegionService {
    config_store: ConfigStore,
    cache: DiscoveryCache,
    config: Config,
    clock: Arc<dyn Clock>,
    discoverer: Option<RegionDiscoverer>,
    aggregator: Option<MultiRegionAggregator>,
}

impl RegionService {
    /// Build a service over the storage locations in `config`.
    ///
    /// Provider collaborators are attached with [`Self::with_usage_source`]
    /// and [`Self::with_inventory_source`]; `status` and `compare_config`
    /// work without them.
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Self {
        let config_store = ConfigStore::new(&config.storage.env_file, &config.storage.region_key);
        let cache = DiscoveryCache::new(&config.storage.cache_file, clock.clone());
        Self {
            config_store,
            cache,
            config,
            clock,
            discoverer: None,
            aggregator: None,
        }
    }

    pub fn with_usage_source(mut self, source: Arc<dyn UsageSource>) -> Self {
        self.discoverer = Some(RegionDiscoverer::new(
            source,
            self.config.discovery.clone(),
            self.clock.clone(),
        ));
        self
    }

    pub fn with_inventory_source(mut self, source: Arc<dyn InventorySource>) -> Self {
        self.aggregator = Some(MultiRegionAggregator::new(
            source,
            self.config.inventory.retry.clone(),
        ));
        self
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.config_store
    }

    pub fn cache(&self) -> &DiscoveryCache {
        &self.cache
    }

    /// Discover active regions, at most one billed call per calendar day.
    ///
    /// A cached run counts as a prevented duplicate and leaves the region
    /// configuration alone. A fresh run persists the configuration change
    /// and then the cache record before it returns.
    pub async fn discover(&self) -> Result<DiscoveryOutcome> {
        if let Some(record) = self.cache.check_today_execution().await? {
            let comparison = self.config_store.compare(&record.regions).await;
            return Ok(DiscoveryOutcome {
                regions: record.regions.clone(),
                from_cache: true,
                prevented_duplicates: record.prevented_duplicates(),
                detection: None,
                comparison,
                config_updated: false,
                record,
            });
        }

        let discoverer = self
            .discoverer
            .as_ref()
            .ok_or(ServiceError::NotConfigured("usage source"))?;
        let detection = discoverer.detect_active_regions().await?;
        let detected = detection.active_regions.clone();

        let partial = |source: StoreError| ServiceError::PartialDiscovery {
            detected: detected.clone(),
            cost_incurred: detection.cost_incurred,
            source,
        };

        let comparison = self.config_store.compare(&detected).await;
        let config_updated = if comparison.has_changes() {
            self.config_store
                .update(&detected)
                .await
                .map_err(partial)?
        } else {
            false
        };

        let record = self
            .cache
            .save_execution(
                detected.clone(),
                detection.execution_time_ms,
                detection.cost_incurred,
            )
            .await
            .map_err(partial)?;

        info!(
            regions = detected.len(),
            added = comparison.added.len(),
            removed = comparison.removed.len(),
            config_updated,
            cost = detection.cost_incurred,
            "Discovery recorded"
        );

        Ok(DiscoveryOutcome {
            regions: detected,
            from_cache: false,
            record,
            detection: Some(detection),
            comparison,
            config_updated,
            prevented_duplicates: 0,
        })
    }

    /// Current configuration and cache state. Read-only; does not count as
    /// a discovery request.
    pub async fn status(&self) -> Result<StatusReport> {
        let configured = self.config_store.read().await;
        let today = self.cache.peek_today().await?;
        Ok(StatusReport {
            configured_regions: configured.iter().map(RegionSummary::from).collect(),
            discovered_today: today.is_some(),
            today,
            cache: self.cache.stats().await?,
            cache_validation: self.cache.validate().await?,
        })
    }

    /// Fetch inventory across `regions`, or the configured regions when
    /// `None`.
    ///
    /// Fails only when every requested region failed.
    pub async fn fetch_inventory(&self, regions: Option<RegionSet>) -> Result<InventoryReport> {
        let aggregator = self
            .aggregator
            .as_ref()
            .ok_or(ServiceError::NotConfigured("inventory source"))?;
        let regions = match regions {
            Some(regions) => regions,
            None => self.config_store.read().await,
        };

        let report = aggregator.aggregate(&regions).await;
        if report.all_failed() {
            return Err(ServiceError::AllRegionsFailed {
                failures: report.outcomes,
            });
        }

        let failures: Vec<RegionFailure> = report
            .failures()
            .into_iter()
            .filter_map(|o| {
                o.error.clone().map(|error| RegionFailure {
                    region: o.region.clone(),
                    error,
                })
            })
            .collect();
        for failure in &failures {
            warn!(region = %failure.region, code = %failure.error.code, "Region omitted from inventory");
        }

        let items = report.into_items();
        let active_count = filter_active(&items, &self.config.inventory.active_statuses).len();
        Ok(InventoryReport {
            regions,
            statistics: statistics(&items),
            items,
            active_count,
            failures,
        })
    }

    /// Diff `candidate` against the configured regions without writing.
    pub async fn compare_config<I, S>(&self, candidate: I) -> ConfigComparison
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config_store.compare(candidate).await
    }

    /// Drop the cache record if it is past the configured retention window.
    pub async fn cleanup_cache(&self) -> Result<bool> {
        Ok(self
            .cache
            .cleanup(self.config.storage.cache_retention_days)
            .await?)
    }
}
