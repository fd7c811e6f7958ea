//! Pure derived views over a merged inventory.

use std::collections::BTreeMap;

use serde::Serialize;

use super::InventoryItem;
use crate::region::RegionId;

/// Item counts by region, kind and status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStatistics {
    pub total_count: usize,
    pub count_by_region: BTreeMap<String, usize>,
    pub count_by_kind: BTreeMap<String, usize>,
    pub count_by_status: BTreeMap<String, usize>,
}

pub fn statistics(items: &[InventoryItem]) -> InventoryStatistics {
    let mut stats = InventoryStatistics {
        total_count: items.len(),
        ..Default::default()
    };
    for item in items {
        *stats
            .count_by_region
            .entry(item.region.to_string())
            .or_default() += 1;
        *stats
            .count_by_kind
            .entry(item.kind.to_string())
            .or_default() += 1;
        *stats
            .count_by_status
            .entry(item.status.clone())
            .or_default() += 1;
    }
    stats
}

/// Items whose status is in `active_statuses`. Matching is exact.
pub fn filter_active<'a, S: AsRef<str>>(
    items: &'a [InventoryItem],
    active_statuses: &[S],
) -> Vec<&'a InventoryItem> {
    items
        .iter()
        .filter(|item| active_statuses.iter().any(|s| s.as_ref() == item.status))
        .collect()
}

pub fn filter_by_region<'a>(items: &'a [InventoryItem], region: &RegionId) -> Vec<&'a InventoryItem> {
    items.iter().filter(|item| &item.region == region).collect()
}
