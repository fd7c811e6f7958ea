//! Discovery cycle across service instances sharing the same files.

use std::sync::Arc;

use chrono::Duration;
use tempfile::TempDir;

use regionscope::errors::ProviderError;
use regionscope::region::{parse_list, RegionSet};
use regionscope::service::{RegionService, ServiceError};
use regionscope::store::ConfigStore;
use regionscope::test_utils::MockUsageSource;

use crate::common::{clock, config_in};

#[tokio::test]
async fn test_cache_survives_restart() {
    let dir = TempDir::new().unwrap();
    let clock = clock();
    let usage = Arc::new(MockUsageSource::with_tokens(&["us-east-1", "eu-central-1"]));

    let first = RegionService::new(config_in(&dir), clock.clone()).with_usage_source(usage.clone());
    first.discover().await.unwrap();
    drop(first);

    // A new process sees today's record on disk and does not pay again
    let second = RegionService::new(config_in(&dir), clock.clone()).with_usage_source(usage.clone());
    let outcome = second.discover().await.unwrap();
    assert!(outcome.from_cache);
    assert_eq!(outcome.prevented_duplicates, 1);
    assert_eq!(usage.calls(), 1);

    let stats = second.cache().stats().await.unwrap();
    assert_eq!(stats.total_executions, 1);
    assert_eq!(stats.prevented_duplicates, 1);
}

#[tokio::test]
async fn test_discovery_preserves_unrelated_settings() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    std::fs::write(
        &config.storage.env_file,
        "AWS_PROFILE=prod\nAWS_REGIONS=us-east-1,ap-northeast-1\nLOG_LEVEL=debug\n",
    )
    .unwrap();

    let usage = Arc::new(MockUsageSource::with_tokens(&["us-east-1", "eu-west-1"]));
    let service = RegionService::new(config.clone(), clock()).with_usage_source(usage);
    let outcome = service.discover().await.unwrap();

    assert_eq!(outcome.comparison.added, parse_list("eu-west-1"));
    assert_eq!(outcome.comparison.removed, parse_list("ap-northeast-1"));
    assert_eq!(outcome.comparison.unchanged, parse_list("us-east-1"));
    assert!(outcome.config_updated);

    let contents = std::fs::read_to_string(&config.storage.env_file).unwrap();
    assert_eq!(
        contents,
        "AWS_PROFILE=prod\nAWS_REGIONS=us-east-1,eu-west-1\nLOG_LEVEL=debug\n"
    );

    // Any other holder of the same file sees the change
    let store = ConfigStore::new(&config.storage.env_file, "AWS_REGIONS");
    assert_eq!(
        store.read().await,
        RegionSet::from_tokens(["eu-west-1", "us-east-1"])
    );
}

#[tokio::test]
async fn test_failed_day_then_successful_day() {
    let dir = TempDir::new().unwrap();
    let clock = clock();
    let usage = Arc::new(MockUsageSource::with_tokens(&["ca-central-1"]));
    for _ in 0..3 {
        usage
            .push_err(ProviderError::new("ThrottlingException", "Rate exceeded"))
            .await;
    }
    let service = RegionService::new(config_in(&dir), clock.clone()).with_usage_source(usage.clone());

    let err = service.discover().await.unwrap_err();
    assert!(matches!(err, ServiceError::Discovery(_)));
    assert_eq!(usage.calls(), 3);
    assert!(!service.status().await.unwrap().discovered_today);

    // A failed run is not cached, so the same day may try again
    let outcome = service.discover().await.unwrap();
    assert!(!outcome.from_cache);
    assert_eq!(outcome.regions, parse_list("ca-central-1"));

    clock.advance(Duration::days(1));
    let status = service.status().await.unwrap();
    assert!(!status.discovered_today);
    assert_eq!(status.cache.total_executions, 1);
}
