//! Region identifiers and region sets.
//!
//! A region token is admitted only when it matches the provider naming
//! pattern (`us-east-1`, `ap-southeast-2`, ...) *and* appears in the static
//! allow-list below. Everything else is silently dropped: parsing returns the
//! best-effort accepted subset, never an error.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

/// Separator used by the persisted `KEY=a,b,c` region list.
pub const LIST_SEPARATOR: char = ',';

static REGION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2,3}-[a-z]+-\d+$").expect("region pattern is a valid regex")
});

/// Known regions with their display names.
pub const KNOWN_REGIONS: &[(&str, &str)] = &[
    ("us-east-1", "US East (N. Virginia)"),
    ("us-east-2", "US East (Ohio)"),
    ("us-west-1", "US West (N. California)"),
    ("us-west-2", "US West (Oregon)"),
    ("af-south-1", "Africa (Cape Town)"),
    ("ap-east-1", "Asia Pacific (Hong Kong)"),
    ("ap-south-1", "Asia Pacific (Mumbai)"),
    ("ap-south-2", "Asia Pacific (Hyderabad)"),
    ("ap-southeast-1", "Asia Pacific (Singapore)"),
    ("ap-southeast-2", "Asia Pacific (Sydney)"),
    ("ap-southeast-3", "Asia Pacific (Jakarta)"),
    ("ap-southeast-4", "Asia Pacific (Melbourne)"),
    ("ap-northeast-1", "Asia Pacific (Tokyo)"),
    ("ap-northeast-2", "Asia Pacific (Seoul)"),
    ("ap-northeast-3", "Asia Pacific (Osaka)"),
    ("ca-central-1", "Canada (Central)"),
    ("ca-west-1", "Canada West (Calgary)"),
    ("eu-central-1", "Europe (Frankfurt)"),
    ("eu-central-2", "Europe (Zurich)"),
    ("eu-west-1", "Europe (Ireland)"),
    ("eu-west-2", "Europe (London)"),
    ("eu-west-3", "Europe (Paris)"),
    ("eu-south-1", "Europe (Milan)"),
    ("eu-south-2", "Europe (Spain)"),
    ("eu-north-1", "Europe (Stockholm)"),
    ("il-central-1", "Israel (Tel Aviv)"),
    ("me-south-1", "Middle East (Bahrain)"),
    ("me-central-1", "Middle East (UAE)"),
    ("sa-east-1", "South America (Sao Paulo)"),
];

/// Returns true if `token` is a well-formed, allow-listed region identifier.
pub fn is_valid(token: &str) -> bool {
    REGION_PATTERN.is_match(token) && KNOWN_REGIONS.iter().any(|(id, _)| *id == token)
}

/// Human-readable name for a region, if it is allow-listed.
pub fn display_name(token: &str) -> Option<&'static str> {
    KNOWN_REGIONS
        .iter()
        .find(|(id, _)| *id == token)
        .map(|(_, name)| *name)
}

/// A validated region identifier.
///
/// Only constructible through [`RegionId::parse`], so holding one proves the
/// token passed [`is_valid`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionId(String);

impl RegionId {
    /// Validate a raw token, trimming surrounding whitespace.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        is_valid(token).then(|| Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn display_name(&self) -> &'static str {
        display_name(&self.0).unwrap_or("Unknown region")
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RegionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RegionId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid region identifier: {}", value))
    }
}

impl From<RegionId> for String {
    fn from(region: RegionId) -> Self {
        region.0
    }
}

/// A set of unique regions.
///
/// Keeps first-insertion order for display; equality ignores order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<RegionId>", into = "Vec<RegionId>")]
pub struct RegionSet {
    regions: Vec<RegionId>,
}

impl RegionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a region. Returns false if it was already present.
    pub fn insert(&mut self, region: RegionId) -> bool {
        if self.regions.contains(&region) {
            return false;
        }
        self.regions.push(region);
        true
    }

    /// Validate and collect raw tokens, dropping anything invalid.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tokens
            .into_iter()
            .filter_map(|t| RegionId::parse(t.as_ref()))
            .collect()
    }

    pub fn contains(&self, region: &RegionId) -> bool {
        self.regions.contains(region)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RegionId> {
        self.regions.iter()
    }

    /// Members of `self` not in `other`, in `self`'s order.
    pub fn difference(&self, other: &RegionSet) -> RegionSet {
        self.iter().filter(|r| !other.contains(r)).cloned().collect()
    }

    /// Members of `self` also in `other`, in `self`'s order.
    pub fn intersection(&self, other: &RegionSet) -> RegionSet {
        self.iter().filter(|r| other.contains(r)).cloned().collect()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.iter().map(|r| r.to_string()).collect()
    }
}

impl PartialEq for RegionSet {
    fn eq(&self, other: &Self) -> bool {
        let lhs: HashSet<&RegionId> = self.regions.iter().collect();
        let rhs: HashSet<&RegionId> = other.regions.iter().collect();
        lhs == rhs
    }
}

impl Eq for RegionSet {}

impl FromIterator<RegionId> for RegionSet {
    fn from_iter<T: IntoIterator<Item = RegionId>>(iter: T) -> Self {
        let mut set = RegionSet::new();
        for region in iter {
            set.insert(region);
        }
        set
    }
}

impl From<Vec<RegionId>> for RegionSet {
    fn from(regions: Vec<RegionId>) -> Self {
        regions.into_iter().collect()
    }
}

impl From<RegionSet> for Vec<RegionId> {
    fn from(set: RegionSet) -> Self {
        set.regions
    }
}

impl IntoIterator for RegionSet {
    type Item = RegionId;
    type IntoIter = std::vec::IntoIter<RegionId>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.into_iter()
    }
}

impl<'a> IntoIterator for &'a RegionSet {
    type Item = &'a RegionId;
    type IntoIter = std::slice::Iter<'a, RegionId>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}

/// Deserialize a region array, dropping tokens that are not allow-listed.
///
/// For persisted documents that must stay readable when the allow-list
/// changes between releases.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<RegionSet, D::Error>
where
    D: Deserializer<'de>,
{
    let tokens = Vec::<String>::deserialize(deserializer)?;
    Ok(RegionSet::from_tokens(tokens))
}

/// Parse a separator-delimited region list.
///
/// Trims each token, drops empty and invalid tokens, and deduplicates.
pub fn parse_list(raw: &str) -> RegionSet {
    RegionSet::from_tokens(raw.split(LIST_SEPARATOR))
}

/// Format a region set as a separator-delimited list.
///
/// `parse_list(&format_list(&s)) == s` for every `RegionSet`.
pub fn format_list(regions: &RegionSet) -> String {
    regions
        .iter()
        .map(RegionId::as_str)
        .collect::<Vec<_>>()
        .join(&LIST_SEPARATOR.to_string())
}
