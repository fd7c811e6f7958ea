//! Retry utilities with exponential backoff and classifier-driven stopping.
//!
//! Provides the retry policy shared by the billed discovery call and the
//! per-region inventory fetches. Backoff scheduling is delegated to `backon`;
//! whether a failure is worth retrying at all is decided per error instance
//! by the classifier passed to [`with_retry`].

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::ErrorDescriptor;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 = no retries, just initial attempt).
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Cap applied to every computed delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays. Must be greater than 1.
    pub backoff_multiplier: f64,
    /// Randomise delays to avoid synchronised retries.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::for_inventory()
    }
}

impl RetryPolicy {
    /// Retry policy for the billed usage query.
    ///
    /// Every attempt is charged, so retries are few and widely spaced:
    /// - Base delay: 1s
    /// - Max delay: 10s
    /// - Max retries: 2
    pub fn for_discovery() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    /// Retry policy for unbilled, rate-limited inventory queries.
    ///
    /// - Base delay: 500ms
    /// - Max delay: 8s
    /// - Max retries: 3
    pub fn for_inventory() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::for_inventory()
        }
    }

    /// Check the policy's numeric invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.backoff_multiplier.is_nan() || self.backoff_multiplier <= 1.0 {
            return Err(format!(
                "backoff_multiplier must be greater than 1, got {}",
                self.backoff_multiplier
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(format!(
                "max_delay_ms ({}) must not be below base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            ));
        }
        Ok(())
    }

    /// Total number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Calculate the delay slept after a failed attempt (0-indexed).
    ///
    /// delay = min(base * multiplier^attempt, max). Jitter is not included.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let raw = self.base_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Build the equivalent `backon` backoff.
    pub fn backoff(&self) -> ExponentialBuilder {
        let builder = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_factor(self.backoff_multiplier as f32)
            .with_max_times(self.max_retries as usize);
        if self.jitter {
            builder.with_jitter()
        } else {
            builder
        }
    }
}

/// Run `operation` under `policy`, consulting `classify` after each failure.
///
/// Makes at most `policy.max_retries + 1` attempts. A failure classified as
/// not recoverable stops immediately. The last error is returned unchanged.
pub async fn with_retry<T, E, F, Fut, C>(
    operation_name: &str,
    policy: &RetryPolicy,
    classify: C,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> ErrorDescriptor,
    E: Display,
{
    operation
        .retry(policy.backoff())
        .when(|err: &E| {
            let descriptor = classify(err);
            if !descriptor.recoverable {
                debug!(
                    operation = %operation_name,
                    code = %descriptor.code,
                    "Failure is not recoverable, giving up"
                );
            }
            descriptor.recoverable
        })
        .notify(|err: &E, dur: Duration| {
            warn!(operation = %operation_name, error = %err, delay = ?dur, "Attempt failed, retrying");
        })
        .await
}
