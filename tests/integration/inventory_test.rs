//! Inventory fetches driven by the configured region list.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use regionscope::errors::{ErrorCode, ProviderError};
use regionscope::inventory::{filter_by_region, ResourceKind};
use regionscope::region::{parse_list, RegionId};
use regionscope::service::RegionService;
use regionscope::test_utils::{MockInventorySource, MockUsageSource};

use crate::common::{clock, config_in};

#[tokio::test]
async fn test_discover_then_fetch_inventory() {
    let dir = TempDir::new().unwrap();
    let usage = Arc::new(MockUsageSource::with_tokens(&["us-east-1", "eu-west-1", "us-west-2"]));
    let inventory = Arc::new(MockInventorySource::new());
    inventory
        .add_ids("us-east-1", ResourceKind::ComputeInstance, &["i-shared"])
        .await;
    inventory
        .add_ids("us-west-2", ResourceKind::ComputeInstance, &["i-shared"])
        .await;
    inventory
        .add_ids("us-west-2", ResourceKind::Function, &["resize"])
        .await;
    inventory
        .fail(
            "eu-west-1",
            ResourceKind::Bucket,
            ProviderError::new("InvalidRegion", "region not enabled"),
        )
        .await;
    inventory.set_delay("us-east-1", Duration::from_millis(30)).await;

    let service = RegionService::new(config_in(&dir), clock())
        .with_usage_source(usage)
        .with_inventory_source(inventory);
    service.discover().await.unwrap();

    let report = service.fetch_inventory(None).await.unwrap();

    // Input order is us-east-1, eu-west-1, us-west-2 regardless of the delay
    let keys: Vec<&str> = report
        .items
        .iter()
        .map(|i| i.cross_region_key.as_str())
        .collect();
    assert_eq!(
        keys,
        vec![
            "compute-instance-us-east-1-i-shared",
            "compute-instance-us-west-2-i-shared",
            "function-us-west-2-resize",
        ]
    );
    assert_eq!(report.regions, parse_list("us-east-1,eu-west-1,us-west-2"));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].error.code, ErrorCode::InvalidRegion);

    let west = RegionId::parse("us-west-2").unwrap();
    assert_eq!(filter_by_region(&report.items, &west).len(), 2);
    assert_eq!(report.statistics.count_by_kind["compute-instance"], 2);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["failures"][0]["region"], "eu-west-1");
    assert_eq!(json["failures"][0]["error"]["code"], "INVALID_REGION");
    assert_eq!(json["statistics"]["totalCount"], 3);
}
