use std::time::Duration;

use super::*;
use crate::test_utils::MockInventorySource;

fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay_ms: 1,
        max_delay_ms: 2,
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

fn regions(tokens: &[&str]) -> RegionSet {
    RegionSet::from_tokens(tokens)
}

fn region(token: &str) -> RegionId {
    RegionId::parse(token).unwrap()
}

fn keys(items: &[InventoryItem]) -> Vec<&str> {
    items.iter().map(|i| i.cross_region_key.as_str()).collect()
}

#[tokio::test]
async fn test_empty_input_makes_no_calls() {
    let source = Arc::new(MockInventorySource::new());
    let aggregator = MultiRegionAggregator::new(source.clone(), fast_retry(3));

    let items = aggregator
        .get_resources_from_all_regions(&RegionSet::new())
        .await;

    assert!(items.is_empty());
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_failed_region_is_omitted_without_error() {
    let source = Arc::new(MockInventorySource::with_kinds(&[ResourceKind::ComputeInstance]));
    source
        .add_ids("us-east-1", ResourceKind::ComputeInstance, &["i-a1", "i-a2"])
        .await;
    source
        .add_ids("eu-west-1", ResourceKind::ComputeInstance, &["i-b1"])
        .await;
    source
        .add_ids("ap-south-1", ResourceKind::ComputeInstance, &["i-c1"])
        .await;
    source
        .fail_region("eu-west-1", ProviderError::new("AccessDeniedException", "denied"))
        .await;

    let aggregator = MultiRegionAggregator::new(source.clone(), fast_retry(1));
    let report = aggregator
        .aggregate(&regions(&["us-east-1", "eu-west-1", "ap-south-1"]))
        .await;

    assert_eq!(
        keys(&report.items()),
        vec![
            "compute-instance-us-east-1-i-a1",
            "compute-instance-us-east-1-i-a2",
            "compute-instance-ap-south-1-i-c1",
        ]
    );
    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].region, region("eu-west-1"));
    assert_eq!(
        failures[0].error.as_ref().unwrap().code,
        ErrorCode::PermissionDenied
    );
    assert!(!report.all_failed());
    assert_eq!(
        report.succeeded_regions(),
        regions(&["us-east-1", "ap-south-1"])
    );
}

#[tokio::test]
async fn test_output_follows_input_order_not_completion_order() {
    let source = Arc::new(MockInventorySource::with_kinds(&[ResourceKind::Bucket]));
    source.add_ids("us-east-1", ResourceKind::Bucket, &["logs"]).await;
    source.add_ids("us-west-2", ResourceKind::Bucket, &["assets"]).await;
    source.set_delay("us-east-1", Duration::from_millis(50)).await;

    let aggregator = MultiRegionAggregator::new(source, fast_retry(0));
    let items = aggregator
        .get_resources_from_all_regions(&regions(&["us-east-1", "us-west-2"]))
        .await;

    assert_eq!(
        keys(&items),
        vec!["bucket-us-east-1-logs", "bucket-us-west-2-assets"]
    );
}

#[tokio::test]
async fn test_kinds_merge_in_kind_order() {
    let source = Arc::new(MockInventorySource::new());
    source.add_ids("us-east-1", ResourceKind::Bucket, &["b1"]).await;
    source.add_ids("us-east-1", ResourceKind::Function, &["f1"]).await;
    source
        .add_ids("us-east-1", ResourceKind::ComputeInstance, &["i-1"])
        .await;

    let aggregator = MultiRegionAggregator::new(source.clone(), fast_retry(0));
    let items = aggregator
        .get_resources_from_all_regions(&regions(&["us-east-1"]))
        .await;

    assert_eq!(
        keys(&items),
        vec![
            "compute-instance-us-east-1-i-1",
            "function-us-east-1-f1",
            "bucket-us-east-1-b1",
        ]
    );
    assert_eq!(source.calls(), 3);
}

#[tokio::test]
async fn test_one_failing_kind_fails_the_region() {
    let source = Arc::new(MockInventorySource::new());
    source
        .add_ids("us-east-1", ResourceKind::ComputeInstance, &["i-1"])
        .await;
    source
        .fail(
            "us-east-1",
            ResourceKind::Function,
            ProviderError::message("socket timeout"),
        )
        .await;

    let aggregator = MultiRegionAggregator::new(source, fast_retry(1));
    let report = aggregator.aggregate(&regions(&["us-east-1"])).await;

    assert!(report.items().is_empty());
    assert!(report.all_failed());
    assert_eq!(report.outcomes[0].error.as_ref().unwrap().code, ErrorCode::Timeout);
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let source = Arc::new(MockInventorySource::with_kinds(&[ResourceKind::Function]));
    source.add_ids("eu-central-1", ResourceKind::Function, &["fn-1"]).await;
    source
        .fail_times(
            "eu-central-1",
            ResourceKind::Function,
            ProviderError::new("ThrottlingException", "Rate exceeded"),
            2,
        )
        .await;

    let aggregator = MultiRegionAggregator::new(source.clone(), fast_retry(3));
    let report = aggregator.aggregate(&regions(&["eu-central-1"])).await;

    assert!(report.failures().is_empty());
    assert_eq!(report.items().len(), 1);
    assert_eq!(source.calls(), 3);
}

#[tokio::test]
async fn test_invalid_region_is_not_retried() {
    let source = Arc::new(MockInventorySource::with_kinds(&[ResourceKind::Bucket]));
    source
        .fail_region("me-south-1", ProviderError::new("OptInRequired", "opt in first"))
        .await;

    let aggregator = MultiRegionAggregator::new(source.clone(), fast_retry(3));
    let report = aggregator.aggregate(&regions(&["me-south-1"])).await;

    assert_eq!(source.calls(), 1);
    let error = report.outcomes[0].error.clone().unwrap();
    assert_eq!(error.code, ErrorCode::InvalidRegion);
    assert!(!error.recoverable);
    assert!(error.message.contains("me-south-1"));
}

#[tokio::test]
async fn test_same_raw_id_in_two_regions_gets_distinct_keys() {
    let source = Arc::new(MockInventorySource::with_kinds(&[ResourceKind::Function]));
    source.add_ids("us-east-1", ResourceKind::Function, &["handler"]).await;
    source.add_ids("us-west-1", ResourceKind::Function, &["handler"]).await;

    let aggregator = MultiRegionAggregator::new(source, fast_retry(0));
    let items = aggregator
        .get_resources_from_all_regions(&regions(&["us-east-1", "us-west-1"]))
        .await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, items[1].id);
    assert_ne!(items[0].cross_region_key, items[1].cross_region_key);
}

#[test]
fn test_item_from_raw() {
    let raw = RawResource::new("i-0abc", "stopped")
        .with_name("web-1")
        .with_availability_zone("us-east-1a")
        .with_external_ref("arn:aws:ec2:us-east-1:123:instance/i-0abc");
    let item = InventoryItem::from_raw(ResourceKind::ComputeInstance, &region("us-east-1"), raw);

    assert_eq!(item.display_name, "web-1");
    assert_eq!(item.cross_region_key, "compute-instance-us-east-1-i-0abc");
    assert_eq!(item.availability_zone.as_deref(), Some("us-east-1a"));

    let unnamed = InventoryItem::from_raw(
        ResourceKind::Bucket,
        &region("us-east-1"),
        RawResource::new("my-bucket", "available"),
    );
    assert_eq!(unnamed.display_name, "my-bucket");

    let json = serde_json::to_value(&unnamed).unwrap();
    assert_eq!(json["kind"], "bucket");
    assert_eq!(json["crossRegionKey"], "bucket-us-east-1-my-bucket");
    assert!(json.get("availabilityZone").is_none());
}

fn sample_items() -> Vec<InventoryItem> {
    let east = region("us-east-1");
    let west = region("us-west-2");
    vec![
        InventoryItem::from_raw(ResourceKind::ComputeInstance, &east, RawResource::new("i-1", "running")),
        InventoryItem::from_raw(ResourceKind::ComputeInstance, &east, RawResource::new("i-2", "stopped")),
        InventoryItem::from_raw(ResourceKind::Function, &west, RawResource::new("f-1", "Active")),
        InventoryItem::from_raw(ResourceKind::Bucket, &west, RawResource::new("b-1", "available")),
    ]
}

#[test]
fn test_statistics() {
    let stats = statistics(&sample_items());

    assert_eq!(stats.total_count, 4);
    assert_eq!(stats.count_by_region["us-east-1"], 2);
    assert_eq!(stats.count_by_region["us-west-2"], 2);
    assert_eq!(stats.count_by_kind["compute-instance"], 2);
    assert_eq!(stats.count_by_kind["function"], 1);
    assert_eq!(stats.count_by_status["stopped"], 1);

    assert_eq!(statistics(&[]), InventoryStatistics::default());
}

#[test]
fn test_filters() {
    let items = sample_items();
    let vocabulary = crate::config::InventoryConfig::default().active_statuses;

    let active = filter_active(&items, &vocabulary);
    assert_eq!(
        active.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
        vec!["i-1", "f-1", "b-1"]
    );

    let west = filter_by_region(&items, &region("us-west-2"));
    assert_eq!(west.len(), 2);
    assert!(west.iter().all(|i| i.region == region("us-west-2")));
}
