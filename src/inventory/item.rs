//! Inventory value types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::region::RegionId;

/// Kind of resource an inventory query enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    ComputeInstance,
    Function,
    Bucket,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::ComputeInstance,
        ResourceKind::Function,
        ResourceKind::Bucket,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ComputeInstance => "compute-instance",
            ResourceKind::Function => "function",
            ResourceKind::Bucket => "bucket",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider record as returned by an inventory query, before it is
/// attributed to a region.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawResource {
    pub id: String,
    pub name: Option<String>,
    pub status: String,
    pub availability_zone: Option<String>,
    pub last_observed_at: Option<DateTime<Utc>>,
    pub external_ref: Option<String>,
}

impl RawResource {
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_availability_zone(mut self, zone: impl Into<String>) -> Self {
        self.availability_zone = Some(zone.into());
        self
    }

    pub fn with_external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }
}

/// One live resource, attributed to a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: String,
    pub display_name: String,
    pub kind: ResourceKind,
    pub status: String,
    pub region: RegionId,
    /// `kind-region-id`; unique across the merged inventory.
    pub cross_region_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_observed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
}

impl InventoryItem {
    /// Attribute a raw record to `region`. The display name falls back to
    /// the raw id.
    pub fn from_raw(kind: ResourceKind, region: &RegionId, raw: RawResource) -> Self {
        let cross_region_key = cross_region_key(kind, region, &raw.id);
        Self {
            display_name: raw.name.unwrap_or_else(|| raw.id.clone()),
            id: raw.id,
            kind,
            status: raw.status,
            region: region.clone(),
            cross_region_key,
            availability_zone: raw.availability_zone,
            last_observed_at: raw.last_observed_at,
            external_ref: raw.external_ref,
        }
    }
}

/// Composite key disambiguating identical raw ids across regions and kinds.
pub fn cross_region_key(kind: ResourceKind, region: &RegionId, raw_id: &str) -> String {
    format!("{}-{}-{}", kind, region, raw_id)
}
