//! Discovery and inventory configuration types.

use serde::Deserialize;

use crate::utils::retry::RetryPolicy;

/// Price of one usage-dimension query, in USD.
pub const DEFAULT_COST_PER_REQUEST: f64 = 0.01;

/// Settings for the billed region discovery call.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Number of whole months the usage window spans.
    pub lookback_months: u32,
    /// Query the current month-to-date instead of ending at the previous month.
    pub include_current_month: bool,
    /// Cost charged per usage query attempt.
    pub cost_per_request: f64,
    /// Retry policy for the usage query.
    pub retry: RetryPolicy,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            lookback_months: 1,
            include_current_month: false,
            cost_per_request: DEFAULT_COST_PER_REQUEST,
            retry: RetryPolicy::for_discovery(),
        }
    }
}

/// Settings for multi-region inventory aggregation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Status values counted as active by `filter_active`.
    pub active_statuses: Vec<String>,
    /// Retry policy for each per-kind inventory query.
    pub retry: RetryPolicy,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            active_statuses: ["running", "active", "available", "Active"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            retry: RetryPolicy::for_inventory(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_config_default() {
        let discovery = DiscoveryConfig::default();
        assert_eq!(discovery.lookback_months, 1);
        assert!(!discovery.include_current_month);
        assert!((discovery.cost_per_request - 0.01).abs() < f64::EPSILON);
        assert_eq!(discovery.retry, RetryPolicy::for_discovery());
    }

    #[test]
    fn test_inventory_config_default() {
        let inventory = InventoryConfig::default();
        assert!(inventory.active_statuses.contains(&"running".to_string()));
        assert_eq!(inventory.retry, RetryPolicy::for_inventory());
    }
}
