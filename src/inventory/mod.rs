//! Multi-region inventory aggregation.
//!
//! One task is spawned per region. Inside a task, every resource kind is
//! fetched concurrently, each fetch under its own retry policy. All tasks are
//! awaited to completion and joined in input-region order, so a slow or
//! failing region never cancels or reorders the others.
//!
//! A region's outcome is all-or-nothing: if any of its kind fetches fails,
//! the region is reported as failed and its partial items are discarded.

mod item;
mod stats;

pub use item::{cross_region_key, InventoryItem, RawResource, ResourceKind};
pub use stats::{filter_active, filter_by_region, statistics, InventoryStatistics};

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::{classify_inventory_error, ErrorCode, ErrorDescriptor, ProviderError};
use crate::region::{RegionId, RegionSet};
use crate::utils::retry::{with_retry, RetryPolicy};

/// Unbilled, rate-limited per-region inventory queries.
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Resource kinds to fetch for every region.
    fn kinds(&self) -> Vec<ResourceKind> {
        ResourceKind::ALL.to_vec()
    }

    /// Enumerate live resources of `kind` in `region`.
    async fn fetch(
        &self,
        region: &RegionId,
        kind: ResourceKind,
    ) -> Result<Vec<RawResource>, ProviderError>;
}

/// Result of fetching one region.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionFetchOutcome {
    pub region: RegionId,
    pub items: Vec<InventoryItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDescriptor>,
    pub duration_ms: u64,
}

impl RegionFetchOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn failed(region: RegionId, error: ErrorDescriptor, duration_ms: u64) -> Self {
        Self {
            region,
            items: Vec::new(),
            error: Some(error),
            duration_ms,
        }
    }
}

/// Per-region outcomes of one aggregation call, in input-region order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationReport {
    pub outcomes: Vec<RegionFetchOutcome>,
}

impl AggregationReport {
    /// Items of every successful region, in region order, preserving each
    /// region's internal order.
    pub fn items(&self) -> Vec<InventoryItem> {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .flat_map(|o| o.items.iter().cloned())
            .collect()
    }

    pub fn into_items(self) -> Vec<InventoryItem> {
        self.outcomes
            .into_iter()
            .filter(|o| o.is_success())
            .flat_map(|o| o.items)
            .collect()
    }

    pub fn failures(&self) -> Vec<&RegionFetchOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success()).collect()
    }

    pub fn succeeded_regions(&self) -> RegionSet {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.region.clone())
            .collect()
    }

    /// True when at least one region was requested and none succeeded.
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| !o.is_success())
    }
}

/// Fans inventory queries out across regions and merges the results.
pub struct MultiRegionAggregator {
    source: Arc<dyn InventorySource>,
    retry: RetryPolicy,
}

impl MultiRegionAggregator {
    pub fn new(source: Arc<dyn InventorySource>, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    /// Fetch every region and return the per-region outcomes.
    ///
    /// Never fails as a whole; escalation when every region failed is left
    /// to the caller.
    pub async fn aggregate(&self, regions: &RegionSet) -> AggregationReport {
        if regions.is_empty() {
            return AggregationReport::default();
        }

        let started = Instant::now();
        let mut handles = Vec::with_capacity(regions.len());
        for region in regions {
            let source = self.source.clone();
            let retry = self.retry.clone();
            let region = region.clone();
            handles.push(tokio::spawn(fetch_region(source, region, retry)));
        }

        let outcomes: Vec<RegionFetchOutcome> = join_all(handles)
            .await
            .into_iter()
            .zip(regions.iter())
            .map(|(joined, region)| {
                joined.unwrap_or_else(|e| {
                    warn!(region = %region, error = %e, "Region fetch task aborted");
                    RegionFetchOutcome::failed(
                        region.clone(),
                        ErrorDescriptor::new(
                            ErrorCode::Unclassified,
                            format!("Inventory task for {} aborted: {}", region, e),
                            "Retry the inventory refresh for this region",
                            true,
                        ),
                        0,
                    )
                })
            })
            .collect();

        let report = AggregationReport { outcomes };
        info!(
            regions = regions.len(),
            failed = report.failures().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Inventory aggregation completed"
        );
        report
    }

    /// Merged items of every region that succeeded.
    ///
    /// Empty input returns immediately without querying the source.
    pub async fn get_resources_from_all_regions(&self, regions: &RegionSet) -> Vec<InventoryItem> {
        self.aggregate(regions).await.into_items()
    }
}

async fn fetch_region(
    source: Arc<dyn InventorySource>,
    region: RegionId,
    retry: RetryPolicy,
) -> RegionFetchOutcome {
    let started = Instant::now();
    let kinds = source.kinds();
    debug!(region = %region, kinds = kinds.len(), "Fetching region inventory");

    let source = &source;
    let region_ref = &region;
    let retry = &retry;
    let fetches = kinds.iter().map(move |&kind| async move {
        let operation = format!("fetch {} in {}", kind, region_ref);
        let result = with_retry(
            &operation,
            retry,
            |err: &ProviderError| classify_inventory_error(err, region_ref.as_str()),
            move || source.fetch(region_ref, kind),
        )
        .await;
        (kind, result)
    });
    let results = join_all(fetches).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    let mut items = Vec::new();
    for (kind, result) in results {
        match result {
            Ok(raw) => items.extend(
                raw.into_iter()
                    .map(|resource| InventoryItem::from_raw(kind, &region, resource)),
            ),
            Err(err) => {
                let descriptor = classify_inventory_error(&err, region.as_str());
                warn!(
                    region = %region,
                    kind = %kind,
                    code = %descriptor.code,
                    error = %descriptor.message,
                    "Region inventory fetch failed"
                );
                return RegionFetchOutcome::failed(region, descriptor, duration_ms);
            }
        }
    }

    debug!(region = %region, items = items.len(), duration_ms, "Region inventory fetched");
    RegionFetchOutcome {
        region,
        items,
        error: None,
        duration_ms,
    }
}

#[cfg(test)]
mod tests;
