//! Errors surfaced by [`super::RegionService`].

use thiserror::Error;

use crate::discovery::DiscoveryError;
use crate::errors::{ErrorCode, ErrorDescriptor};
use crate::inventory::RegionFetchOutcome;
use crate::region::{format_list, RegionSet};
use crate::store::StoreError;

const NOTHING_PERSISTED_NOTE: &str = "The region configuration and discovery cache were not changed.";

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The usage query failed; nothing was persisted.
    #[error("Region discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// The usage query succeeded and was billed, but its result could not be
    /// persisted.
    #[error("Discovered {} region(s) but failed to persist them: {source}", .detected.len())]
    PartialDiscovery {
        detected: RegionSet,
        cost_incurred: f64,
        #[source]
        source: StoreError,
    },

    #[error("Inventory fetch failed in all {} requested region(s)", .failures.len())]
    AllRegionsFailed { failures: Vec<RegionFetchOutcome> },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("No {0} is configured")]
    NotConfigured(&'static str),
}

impl ServiceError {
    /// User-facing description of this failure.
    pub fn descriptor(&self) -> ErrorDescriptor {
        match self {
            ServiceError::Discovery(e) => {
                let mut descriptor = e.descriptor();
                let cost = e.cost_incurred();
                if cost > 0.0 {
                    descriptor.message = format!(
                        "{} The failed attempts were billed (${:.2}).",
                        descriptor.message, cost
                    );
                }
                descriptor.remediation =
                    format!("{} {}", descriptor.remediation, NOTHING_PERSISTED_NOTE);
                descriptor
            }
            ServiceError::PartialDiscovery {
                detected,
                cost_incurred,
                source,
            } => {
                let storage = source.descriptor();
                ErrorDescriptor {
                    message: format!(
                        "Discovery was billed (${:.2}) and found [{}], but the result was not saved: {}",
                        cost_incurred,
                        format_list(detected),
                        storage.message
                    ),
                    remediation: format!(
                        "{}. Today's discovery was not recorded, so the next run will be billed again",
                        storage.remediation.trim_end_matches('.')
                    ),
                    ..storage
                }
            }
            ServiceError::AllRegionsFailed { failures } => {
                let first = failures.iter().find_map(|o| o.error.clone());
                match first {
                    Some(first) => ErrorDescriptor {
                        message: format!(
                            "Inventory failed in all {} region(s); first failure: {}",
                            failures.len(),
                            first.message
                        ),
                        ..first
                    },
                    None => ErrorDescriptor::new(
                        ErrorCode::Unclassified,
                        "Inventory failed in every requested region",
                        "Retry the inventory refresh",
                        true,
                    ),
                }
            }
            ServiceError::Store(e) => e.descriptor(),
            ServiceError::NotConfigured(what) => ErrorDescriptor::new(
                ErrorCode::Unclassified,
                format!("No {} is configured", what),
                "Construct the service with the missing collaborator",
                false,
            ),
        }
    }
}
