//! regionscope - active region discovery and multi-region inventory
//!
//! Finds the regions of a cloud account that show billed activity, keeps a
//! local region list in sync with them, and fans read-only inventory queries
//! out across those regions.
//!
//! The billed discovery call runs at most once per calendar day; repeat
//! requests are answered from [`store::DiscoveryCache`]. Provider access is
//! abstracted behind [`discovery::UsageSource`] and
//! [`inventory::InventorySource`].

pub mod config;
pub mod discovery;
pub mod errors;
pub mod inventory;
pub mod region;
pub mod service;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod utils;
