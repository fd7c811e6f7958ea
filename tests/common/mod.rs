//! Shared fixtures for integration tests.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use regionscope::config::Config;
use regionscope::utils::clock::FixedClock;
use regionscope::utils::retry::RetryPolicy;

/// Retry policy with millisecond delays.
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay_ms: 1,
        max_delay_ms: 2,
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// Configuration with both stores inside `dir`.
pub fn config_in(dir: &TempDir) -> Config {
    let mut config = Config::for_test();
    config.storage.env_file = dir.path().join(".env.local");
    config.storage.cache_file = dir.path().join(".discovery-cache.json");
    config.discovery.retry = fast_retry(2);
    config.inventory.retry = fast_retry(2);
    config
}

/// Clock fixed at 2026-09-01 10:00 UTC.
pub fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 9, 1, 10, 0, 0).unwrap(),
    ))
}
