//! Error classification for discovery, inventory and config-storage failures.
//!
//! Raw failures coming back from provider collaborators are reduced to an
//! [`ErrorDescriptor`]: a human message, a remediation hint, a recoverable
//! flag and an optional retry-after. Each operation category has an ordered
//! matcher table; the first matching row wins and unmatched failures fall
//! through to a category-specific generic descriptor.
//!
//! Recoverable means "retrying, possibly after an operator fixes something,
//! can succeed". The retry executor in [`crate::utils::retry`] uses the flag
//! to decide whether to back off or stop.

use std::fmt;
use std::io;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Raw failure reported by a provider collaborator.
///
/// `kind` carries the provider's error code when there is one (e.g.
/// `AccessDeniedException`, `ThrottlingException`), otherwise it is empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// A failure with a message but no provider error code.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new("", message)
    }
}

impl From<&io::Error> for ProviderError {
    fn from(err: &io::Error) -> Self {
        Self::new(format!("{:?}", err.kind()), err.to_string())
    }
}

/// Error taxonomy tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    PermissionDenied,
    RateLimited,
    Timeout,
    NetworkUnreachable,
    InvalidRegion,
    ConfigFilePermission,
    ConfigFileMissing,
    DiskFull,
    Unclassified,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::NetworkUnreachable => "NETWORK_UNREACHABLE",
            ErrorCode::InvalidRegion => "INVALID_REGION",
            ErrorCode::ConfigFilePermission => "CONFIG_FILE_PERMISSION",
            ErrorCode::ConfigFileMissing => "CONFIG_FILE_MISSING",
            ErrorCode::DiskFull => "DISK_FULL",
            ErrorCode::Unclassified => "UNCLASSIFIED",
        };
        f.write_str(name)
    }
}

/// Structured, user-facing description of a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDescriptor {
    pub message: String,
    pub remediation: String,
    pub recoverable: bool,
    pub code: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

impl ErrorDescriptor {
    pub fn new(
        code: ErrorCode,
        message: impl Into<String>,
        remediation: impl Into<String>,
        recoverable: bool,
    ) -> Self {
        Self {
            message: message.into(),
            remediation: remediation.into(),
            recoverable,
            code,
            retry_after_seconds: None,
        }
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_seconds = Some(seconds);
        self
    }
}

impl fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({})", self.code, self.message, self.remediation)
    }
}

/// Operation category a failure is classified under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    /// The billed usage-dimension query.
    Discovery,
    /// A per-region inventory fetch.
    Inventory { region: &'a str },
    /// Reading or writing the local region configuration or cache file.
    ConfigStorage,
}

/// One row of a matcher table.
struct Matcher {
    kinds: &'static [&'static str],
    /// Lowercase substrings searched for in the lowercased message.
    needles: &'static [&'static str],
    build: fn(&Context<'_>) -> ErrorDescriptor,
}

impl Matcher {
    fn matches(&self, err: &ProviderError, lowered: &str) -> bool {
        self.kinds.iter().any(|k| err.kind == *k)
            || self.needles.iter().any(|n| lowered.contains(n))
    }
}

/// Values interpolated into descriptor messages.
struct Context<'a> {
    region: &'a str,
    /// Masked raw message.
    detail: String,
}

const PERMISSION_KINDS: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
    "UnrecognizedClientException",
];
const PERMISSION_NEEDLES: &[&str] = &["not authorized", "access denied", "accessdenied"];

const THROTTLE_KINDS: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "LimitExceededException",
];
const THROTTLE_NEEDLES: &[&str] = &["rate exceeded", "too many requests", "throttl"];

const TIMEOUT_KINDS: &[&str] = &["TimedOut", "TimeoutError", "RequestTimeout"];
const TIMEOUT_NEEDLES: &[&str] = &["timed out", "timeout"];

const NETWORK_KINDS: &[&str] = &["ConnectionRefused", "ConnectionReset", "NetworkingError"];
const NETWORK_NEEDLES: &[&str] = &[
    "enotfound",
    "econnrefused",
    "econnreset",
    "connection refused",
    "dns error",
    "network is unreachable",
];

const INVALID_REGION_KINDS: &[&str] = &["InvalidRegion", "OptInRequired", "InvalidClientTokenId"];
const INVALID_REGION_NEEDLES: &[&str] = &["invalid region", "is not a valid region", "region not enabled"];

static DISCOVERY_MATCHERS: &[Matcher] = &[
    Matcher {
        kinds: PERMISSION_KINDS,
        needles: PERMISSION_NEEDLES,
        build: |ctx| {
            ErrorDescriptor::new(
                ErrorCode::PermissionDenied,
                format!("Not authorized to query usage data: {}", ctx.detail),
                "Grant ce:GetDimensionValues to the configured principal, then retry",
                true,
            )
        },
    },
    Matcher {
        kinds: THROTTLE_KINDS,
        needles: THROTTLE_NEEDLES,
        build: |_| {
            ErrorDescriptor::new(
                ErrorCode::RateLimited,
                "Usage API rate limit exceeded",
                "Wait before retrying discovery; each request is billed",
                true,
            )
            .with_retry_after(60)
        },
    },
    Matcher {
        kinds: TIMEOUT_KINDS,
        needles: TIMEOUT_NEEDLES,
        build: |_| {
            ErrorDescriptor::new(
                ErrorCode::Timeout,
                "Usage API request timed out",
                "Retry shortly; if it persists, check connectivity to the usage endpoint",
                true,
            )
            .with_retry_after(5)
        },
    },
    Matcher {
        kinds: NETWORK_KINDS,
        needles: NETWORK_NEEDLES,
        build: |_| {
            ErrorDescriptor::new(
                ErrorCode::NetworkUnreachable,
                "Could not reach the usage API",
                "Check network connectivity, proxy settings and DNS resolution",
                true,
            )
            .with_retry_after(10)
        },
    },
];

static INVENTORY_MATCHERS: &[Matcher] = &[
    Matcher {
        kinds: INVALID_REGION_KINDS,
        needles: INVALID_REGION_NEEDLES,
        build: |ctx| {
            ErrorDescriptor::new(
                ErrorCode::InvalidRegion,
                format!("Region {} is not available to this account", ctx.region),
                format!(
                    "Remove {} from the configured regions or opt in to it",
                    ctx.region
                ),
                false,
            )
        },
    },
    Matcher {
        kinds: PERMISSION_KINDS,
        needles: PERMISSION_NEEDLES,
        build: |ctx| {
            ErrorDescriptor::new(
                ErrorCode::PermissionDenied,
                format!("Not authorized to list resources in {}: {}", ctx.region, ctx.detail),
                "Grant read-only describe/list permissions for compute, functions and buckets",
                true,
            )
        },
    },
    Matcher {
        kinds: THROTTLE_KINDS,
        needles: THROTTLE_NEEDLES,
        build: |ctx| {
            ErrorDescriptor::new(
                ErrorCode::RateLimited,
                format!("Inventory API throttled in {}", ctx.region),
                "Reduce request frequency or wait before refreshing inventory",
                true,
            )
            .with_retry_after(30)
        },
    },
    Matcher {
        kinds: TIMEOUT_KINDS,
        needles: TIMEOUT_NEEDLES,
        build: |ctx| {
            ErrorDescriptor::new(
                ErrorCode::Timeout,
                format!("Inventory request timed out in {}", ctx.region),
                "Retry the inventory refresh",
                true,
            )
            .with_retry_after(5)
        },
    },
    Matcher {
        kinds: NETWORK_KINDS,
        needles: NETWORK_NEEDLES,
        build: |ctx| {
            ErrorDescriptor::new(
                ErrorCode::NetworkUnreachable,
                format!("Could not reach the inventory endpoint for {}", ctx.region),
                "Check network connectivity and regional endpoint availability",
                true,
            )
            .with_retry_after(10)
        },
    },
];

static CONFIG_MATCHERS: &[Matcher] = &[
    Matcher {
        kinds: &["PermissionDenied"],
        needles: &["permission denied", "eacces", "eperm"],
        build: |ctx| {
            ErrorDescriptor::new(
                ErrorCode::ConfigFilePermission,
                format!("Cannot write region configuration: {}", ctx.detail),
                "Fix the file permissions so the current user can write it",
                true,
            )
        },
    },
    Matcher {
        kinds: &["NotFound"],
        needles: &["no such file", "enoent", "not found"],
        build: |ctx| {
            ErrorDescriptor::new(
                ErrorCode::ConfigFileMissing,
                format!("Region configuration location does not exist: {}", ctx.detail),
                "Create the configuration directory or point storage.env_file at an existing path",
                true,
            )
        },
    },
    Matcher {
        kinds: &["StorageFull"],
        needles: &["no space left", "enospc", "disk full"],
        build: |_| {
            ErrorDescriptor::new(
                ErrorCode::DiskFull,
                "No space left on device while writing region configuration",
                "Free disk space and retry",
                true,
            )
        },
    },
];

fn generic(operation: Operation<'_>, ctx: &Context<'_>) -> ErrorDescriptor {
    let (message, remediation) = match operation {
        Operation::Discovery => (
            format!("Region discovery failed: {}", ctx.detail),
            "Retry discovery; if it keeps failing, check credentials and the usage API status",
        ),
        Operation::Inventory { region } => (
            format!("Failed to fetch inventory in {}: {}", region, ctx.detail),
            "Retry the inventory refresh for this region",
        ),
        Operation::ConfigStorage => (
            format!("Region configuration storage failed: {}", ctx.detail),
            "Check the configuration file and its directory",
        ),
    };
    ErrorDescriptor::new(ErrorCode::Unclassified, message, remediation, true)
}

/// Classify a raw provider failure for the given operation.
///
/// Pure: the same input always yields the same descriptor.
pub fn classify(err: &ProviderError, operation: Operation<'_>) -> ErrorDescriptor {
    let table = match operation {
        Operation::Discovery => DISCOVERY_MATCHERS,
        Operation::Inventory { .. } => INVENTORY_MATCHERS,
        Operation::ConfigStorage => CONFIG_MATCHERS,
    };
    let ctx = Context {
        region: match operation {
            Operation::Inventory { region } => region,
            _ => "",
        },
        detail: mask_sensitive(&err.message),
    };
    let lowered = err.message.to_lowercase();

    table
        .iter()
        .find(|m| m.matches(err, &lowered))
        .map(|m| (m.build)(&ctx))
        .unwrap_or_else(|| generic(operation, &ctx))
}

pub fn classify_discovery_error(err: &ProviderError) -> ErrorDescriptor {
    classify(err, Operation::Discovery)
}

pub fn classify_inventory_error(err: &ProviderError, region: &str) -> ErrorDescriptor {
    classify(err, Operation::Inventory { region })
}

pub fn classify_config_error(err: &io::Error) -> ErrorDescriptor {
    classify(&ProviderError::from(err), Operation::ConfigStorage)
}

pub const MASKED_ACCESS_KEY: &str = "[MASKED_ACCESS_KEY]";
pub const MASKED_SECRET: &str = "[MASKED_SECRET]";
pub const MASKED_IP: &str = "[MASKED_IP]";

static ACCESS_KEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b").expect("access key pattern is a valid regex")
});

static SECRET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9/+=]{40,}").expect("secret pattern is a valid regex")
});

static IP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,3}(?:\.\d{1,3}){3}\b").expect("ip pattern is a valid regex")
});

/// Replace access-key ids, long secret-like tokens and IPv4 addresses.
pub fn mask_sensitive(message: &str) -> String {
    let masked = ACCESS_KEY_PATTERN.replace_all(message, MASKED_ACCESS_KEY);
    let masked = SECRET_PATTERN.replace_all(&masked, MASKED_SECRET);
    IP_PATTERN.replace_all(&masked, MASKED_IP).into_owned()
}
