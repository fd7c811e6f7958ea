//! Test utilities and mock implementations.
//!
//! In-memory stand-ins for the provider collaborators so discovery and
//! inventory can be exercised without network access. Every mock counts the
//! calls it receives.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::discovery::{TimeWindow, UsageSource};
use crate::errors::ProviderError;
use crate::inventory::{InventorySource, RawResource, ResourceKind};
use crate::region::RegionId;

/// Mock usage API.
///
/// Answers from a queue of scripted responses first, then with the default
/// token list.
#[derive(Default)]
pub struct MockUsageSource {
    scripted: RwLock<VecDeque<Result<Vec<String>, ProviderError>>>,
    default_tokens: RwLock<Vec<String>>,
    windows: RwLock<Vec<TimeWindow>>,
    calls: AtomicU32,
}

impl MockUsageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source that always answers with `tokens`.
    pub fn with_tokens(tokens: &[&str]) -> Self {
        Self {
            default_tokens: RwLock::new(tokens.iter().map(|t| t.to_string()).collect()),
            ..Default::default()
        }
    }

    pub async fn push_ok(&self, tokens: &[&str]) {
        self.scripted
            .write()
            .await
            .push_back(Ok(tokens.iter().map(|t| t.to_string()).collect()));
    }

    pub async fn push_err(&self, err: ProviderError) {
        self.scripted.write().await.push_back(Err(err));
    }

    pub async fn set_tokens(&self, tokens: &[&str]) {
        *self.default_tokens.write().await = tokens.iter().map(|t| t.to_string()).collect();
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn windows(&self) -> Vec<TimeWindow> {
        self.windows.read().await.clone()
    }
}

#[async_trait]
impl UsageSource for MockUsageSource {
    async fn region_tokens(&self, window: &TimeWindow) -> Result<Vec<String>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.windows.write().await.push(*window);
        if let Some(response) = self.scripted.write().await.pop_front() {
            return response;
        }
        Ok(self.default_tokens.read().await.clone())
    }
}

/// A failure injected into [`MockInventorySource`].
struct InjectedFailure {
    error: ProviderError,
    /// Remaining failing calls; `None` fails forever.
    remaining: Option<u32>,
}

/// Mock inventory API keyed by (region, kind).
#[derive(Default)]
pub struct MockInventorySource {
    resources: RwLock<HashMap<(String, ResourceKind), Vec<RawResource>>>,
    failures: RwLock<HashMap<(String, ResourceKind), InjectedFailure>>,
    delays: RwLock<HashMap<String, Duration>>,
    kinds: Option<Vec<ResourceKind>>,
    calls: AtomicU32,
}

impl MockInventorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the kinds fetched per region.
    pub fn with_kinds(kinds: &[ResourceKind]) -> Self {
        Self {
            kinds: Some(kinds.to_vec()),
            ..Default::default()
        }
    }

    pub async fn add_resource(&self, region: &str, kind: ResourceKind, resource: RawResource) {
        self.resources
            .write()
            .await
            .entry((region.to_string(), kind))
            .or_default()
            .push(resource);
    }

    /// Add running resources with the given ids.
    pub async fn add_ids(&self, region: &str, kind: ResourceKind, ids: &[&str]) {
        for id in ids {
            self.add_resource(region, kind, RawResource::new(*id, "running"))
                .await;
        }
    }

    /// Fail every fetch of `kind` in `region`.
    pub async fn fail(&self, region: &str, kind: ResourceKind, error: ProviderError) {
        self.inject(region, kind, error, None).await;
    }

    /// Fail every kind in `region`.
    pub async fn fail_region(&self, region: &str, error: ProviderError) {
        for kind in self.kinds() {
            self.inject(region, kind, error.clone(), None).await;
        }
    }

    /// Fail the next `times` fetches of `kind` in `region`, then recover.
    pub async fn fail_times(&self, region: &str, kind: ResourceKind, error: ProviderError, times: u32) {
        self.inject(region, kind, error, Some(times)).await;
    }

    /// Delay every fetch in `region`.
    pub async fn set_delay(&self, region: &str, delay: Duration) {
        self.delays.write().await.insert(region.to_string(), delay);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn inject(&self, region: &str, kind: ResourceKind, error: ProviderError, remaining: Option<u32>) {
        self.failures
            .write()
            .await
            .insert((region.to_string(), kind), InjectedFailure { error, remaining });
    }
}

#[async_trait]
impl InventorySource for MockInventorySource {
    fn kinds(&self) -> Vec<ResourceKind> {
        self.kinds
            .clone()
            .unwrap_or_else(|| ResourceKind::ALL.to_vec())
    }

    async fn fetch(
        &self,
        region: &RegionId,
        kind: ResourceKind,
    ) -> Result<Vec<RawResource>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delays.read().await.get(region.as_str()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let key = (region.as_str().to_string(), kind);
        {
            let mut failures = self.failures.write().await;
            if let Some(failure) = failures.get_mut(&key) {
                match failure.remaining {
                    None => return Err(failure.error.clone()),
                    Some(n) if n > 0 => {
                        failure.remaining = Some(n - 1);
                        return Err(failure.error.clone());
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(self
            .resources
            .read()
            .await
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }
}
