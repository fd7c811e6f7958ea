//! Active region discovery through the billed usage API.
//!
//! The usage API is asked which region dimension values had activity during
//! a recent calendar window. Each call is charged, so the discoverer makes
//! exactly one logical query per invocation (plus whatever the retry policy
//! allows) and reports the cost it incurred. Deduplicating invocations across
//! a day is the caller's job; see [`crate::store::DiscoveryCache`].

mod window;

pub use window::TimeWindow;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DiscoveryConfig;
use crate::errors::{classify_discovery_error, ErrorDescriptor, ProviderError};
use crate::region::{RegionId, RegionSet};
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::retry::with_retry;

/// Billed usage query returning region-like dimension values.
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Raw region tokens with recorded usage inside `window`.
    async fn region_tokens(&self, window: &TimeWindow) -> Result<Vec<String>, ProviderError>;
}

/// Errors from region discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Usage query failed after {attempts} attempt(s): {source}")]
    Provider {
        #[source]
        source: ProviderError,
        attempts: u32,
        cost_incurred: f64,
    },
}

impl DiscoveryError {
    /// User-facing description of this failure.
    pub fn descriptor(&self) -> ErrorDescriptor {
        match self {
            DiscoveryError::Provider { source, .. } => classify_discovery_error(source),
        }
    }

    /// Cost of the failed attempts.
    pub fn cost_incurred(&self) -> f64 {
        match self {
            DiscoveryError::Provider { cost_incurred, .. } => *cost_incurred,
        }
    }
}

/// Outcome of one discovery invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub active_regions: RegionSet,
    /// Deduplicated raw tokens that are not known regions.
    pub invalid_regions: Vec<String>,
    pub total_found: usize,
    pub execution_time_ms: u64,
    pub cost_incurred: f64,
    pub window: TimeWindow,
    /// Billed attempts made, retries included.
    pub attempts: u32,
}

/// Structural check of a [`DetectionResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionValidation {
    pub is_valid: bool,
    pub issues: Vec<String>,
}

/// Calls the usage API and partitions its answer into known and unknown regions.
pub struct RegionDiscoverer {
    source: Arc<dyn UsageSource>,
    config: DiscoveryConfig,
    clock: Arc<dyn Clock>,
}

impl RegionDiscoverer {
    pub fn new(source: Arc<dyn UsageSource>, config: DiscoveryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            config,
            clock,
        }
    }

    /// Create a discoverer that uses the system clock.
    pub fn with_system_clock(source: Arc<dyn UsageSource>, config: DiscoveryConfig) -> Self {
        Self::new(source, config, Arc::new(SystemClock))
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Query the usage API for regions with recent activity.
    ///
    /// Failures propagate once the retry policy gives up; an empty answer is
    /// never substituted for a failed query.
    pub async fn detect_active_regions(&self) -> Result<DetectionResult, DiscoveryError> {
        let window = TimeWindow::for_discovery(self.clock.today(), &self.config);
        let started = Instant::now();
        let attempts = AtomicU32::new(0);

        debug!(start = %window.start, end = %window.end, "Querying usage API for active regions");

        let source = &self.source;
        let window_ref = &window;
        let attempts_ref = &attempts;
        let result = with_retry(
            "detect_active_regions",
            &self.config.retry,
            classify_discovery_error,
            move || {
                attempts_ref.fetch_add(1, Ordering::SeqCst);
                source.region_tokens(window_ref)
            },
        )
        .await;

        let attempts = attempts.load(Ordering::SeqCst);
        let cost_incurred = f64::from(attempts) * self.config.cost_per_request;
        let execution_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let tokens = match result {
            Ok(tokens) => tokens,
            Err(source) => {
                warn!(attempts, cost = cost_incurred, error = %source, "Region discovery failed");
                return Err(DiscoveryError::Provider {
                    source,
                    attempts,
                    cost_incurred,
                });
            }
        };

        let (active_regions, invalid_regions) = partition_tokens(&tokens);
        let result = DetectionResult {
            total_found: active_regions.len() + invalid_regions.len(),
            active_regions,
            invalid_regions,
            execution_time_ms,
            cost_incurred,
            window,
            attempts,
        };

        if !result.invalid_regions.is_empty() {
            debug!(invalid = ?result.invalid_regions, "Usage API returned unknown region tokens");
        }
        info!(
            active = result.active_regions.len(),
            invalid = result.invalid_regions.len(),
            attempts,
            execution_time_ms,
            "Region discovery completed"
        );
        Ok(result)
    }
}

/// Split raw tokens into known regions and deduplicated unknown tokens.
///
/// Empty and whitespace-only tokens are dropped from both partitions.
pub fn partition_tokens<S: AsRef<str>>(tokens: &[S]) -> (RegionSet, Vec<String>) {
    let mut active = RegionSet::new();
    let mut invalid: Vec<String> = Vec::new();
    for token in tokens {
        let token = token.as_ref().trim();
        if token.is_empty() {
            continue;
        }
        match RegionId::parse(token) {
            Some(region) => {
                active.insert(region);
            }
            None => {
                if !invalid.iter().any(|t| t == token) {
                    invalid.push(token.to_string());
                }
            }
        }
    }
    (active, invalid)
}

/// Check the internal consistency of a detection result.
pub fn validate_detection_result(result: &DetectionResult) -> DetectionValidation {
    let mut issues = Vec::new();

    if result.total_found == 0 {
        issues.push("totalFound is zero".to_string());
    }
    if result.cost_incurred.is_nan() || result.cost_incurred < 0.0 {
        issues.push(format!("costIncurred is negative: {}", result.cost_incurred));
    }
    let partitioned = result.active_regions.len() + result.invalid_regions.len();
    if result.total_found != partitioned {
        issues.push(format!(
            "totalFound ({}) does not match active + invalid ({})",
            result.total_found, partitioned
        ));
    }

    let mut seen: Vec<&str> = Vec::with_capacity(partitioned);
    let combined = result
        .active_regions
        .iter()
        .map(RegionId::as_str)
        .chain(result.invalid_regions.iter().map(String::as_str));
    for token in combined {
        if seen.contains(&token) {
            issues.push(format!("duplicate token: {}", token));
        } else {
            seen.push(token);
        }
    }

    DetectionValidation {
        is_valid: issues.is_empty(),
        issues,
    }
}
