// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for pihole-dns.
//!
//! This module provides specialized error types for:
//! - Startup configuration of the instance registry
//! - Per-instance Pi-hole API failures, which are isolated during fan-out
//! - Caller-facing tool failures, including the confirmation token workflow
//!
//! Every error exposes a stable `reason()` code suitable for machine consumption.

use crate::types::RecordType;
use thiserror::Error;

/// Errors raised while loading the instance configuration at startup.
///
/// Any of these is fatal: the process never serves tool calls without a
/// valid registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No slot had both a URL and a password
    #[error("No Pi-hole instance configured: set PIHOLE_URL and PIHOLE_PASSWORD")]
    NoInstancesConfigured,

    /// A slot had only one of URL and password
    #[error("Pi-hole slot {prefix} is incomplete: {missing} is not set")]
    IncompleteInstance {
        /// Environment prefix of the slot (e.g. `PIHOLE2`)
        prefix: String,
        /// Name of the missing variable
        missing: String,
    },

    /// More instances than the registry supports
    #[error("{count} Pi-hole instances configured; at most {max} are supported")]
    TooManyInstances {
        /// Number supplied
        count: usize,
        /// Supported maximum
        max: usize,
    },

    /// Two slots share the same display name
    #[error("Pi-hole instance name '{name}' is configured more than once")]
    DuplicateInstanceName {
        /// The duplicated name
        name: String,
    },

    /// The URL of a slot could not be parsed or uses an unsupported scheme
    #[error("Invalid URL '{url}' for Pi-hole slot {prefix}: {reason}")]
    InvalidUrl {
        /// Environment prefix of the slot
        prefix: String,
        /// The offending value
        url: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Failure of a single operation against a single Pi-hole instance.
///
/// These errors never abort sibling instances: the fan-out executor records
/// them inline in the aggregate result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplianceError {
    /// Connection refused, DNS failure, gateway error or retry budget exhausted
    #[error("Pi-hole instance '{instance}' unavailable: {reason}")]
    Unavailable {
        /// Instance name
        instance: String,
        /// Underlying cause
        reason: String,
    },

    /// The per-instance ceiling elapsed before the operation completed
    #[error("Pi-hole instance '{instance}' did not respond within {timeout_ms}ms")]
    Timeout {
        /// Instance name
        instance: String,
        /// Ceiling that elapsed, in milliseconds
        timeout_ms: u64,
    },

    /// Login rejected or session refused after renewal
    #[error("Authentication against Pi-hole instance '{instance}' failed: {reason}")]
    AuthenticationFailed {
        /// Instance name
        instance: String,
        /// Appliance message
        reason: String,
    },

    /// The appliance answered with a non-retryable error status
    #[error("Pi-hole instance '{instance}' rejected the request (HTTP {status_code}): {reason}")]
    Rejected {
        /// Instance name
        instance: String,
        /// HTTP status code
        status_code: u16,
        /// Appliance message
        reason: String,
    },

    /// The appliance answered with a body that could not be understood
    #[error("Unexpected response from Pi-hole instance '{instance}': {reason}")]
    InvalidResponse {
        /// Instance name
        instance: String,
        /// Parse failure details
        reason: String,
    },

    /// The task running the operation panicked or was cancelled
    #[error("Operation on Pi-hole instance '{instance}' aborted: {reason}")]
    TaskFailed {
        /// Instance name
        instance: String,
        /// Join error details
        reason: String,
    },
}

impl ApplianceError {
    /// Stable reason code.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "UpstreamUnavailable",
            Self::Timeout { .. } => "UpstreamTimeout",
            Self::AuthenticationFailed { .. } => "UpstreamAuthFailed",
            Self::Rejected { .. } => "UpstreamRejected",
            Self::InvalidResponse { .. } => "UpstreamInvalidResponse",
            Self::TaskFailed { .. } => "InstanceTaskFailed",
        }
    }

    /// Name of the instance the failure belongs to.
    #[must_use]
    pub fn instance(&self) -> &str {
        match self {
            Self::Unavailable { instance, .. }
            | Self::Timeout { instance, .. }
            | Self::AuthenticationFailed { instance, .. }
            | Self::Rejected { instance, .. }
            | Self::InvalidResponse { instance, .. }
            | Self::TaskFailed { instance, .. } => instance,
        }
    }
}

/// Caller-facing failure of a tool invocation.
///
/// Token workflow failures are terminal for the call and never retried; the
/// caller decides whether to request a new preview.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// The `instance` argument names no configured instance
    #[error("Pi-hole instance '{name}' not found (configured: {})", .available.join(", "))]
    UnknownInstance {
        /// Requested name
        name: String,
        /// Configured names in registry order
        available: Vec<String>,
    },

    /// No live pending deletion exists for the key.
    ///
    /// Covers never previewed, already consumed and expired alike.
    #[error("No pending {record_type} deletion for '{hostname}'; request a new preview to obtain a token")]
    NoPendingDeletion {
        /// Record type of the key
        record_type: RecordType,
        /// Hostname of the key
        hostname: String,
    },

    /// A live pending deletion exists but the token differs
    #[error("Confirmation token does not match the pending {record_type} deletion for '{hostname}'")]
    TokenMismatch {
        /// Record type of the key
        record_type: RecordType,
        /// Hostname of the key
        hostname: String,
    },

    /// Preview found nothing to delete on any targeted instance
    #[error("No {record_type} records for '{hostname}' exist on any selected Pi-hole; nothing to delete")]
    NoMatchingRecords {
        /// Record type searched
        record_type: RecordType,
        /// Hostname searched
        hostname: String,
    },

    /// Preview found nothing, but some instances could not be queried
    #[error("No {record_type} records for '{hostname}' found, and Pi-hole instance(s) {} could not be queried", .instances.join(", "))]
    LookupFailed {
        /// Record type searched
        record_type: RecordType,
        /// Hostname searched
        hostname: String,
        /// Instances whose lookup failed
        instances: Vec<String>,
    },

    /// A tool argument failed validation
    #[error("Invalid argument '{argument}': {reason}")]
    InvalidArgument {
        /// Argument name
        argument: String,
        /// Why it was rejected
        reason: String,
    },

    /// No tool with this name
    #[error("Unknown tool '{name}'")]
    UnknownTool {
        /// Requested tool name
        name: String,
    },

    /// No tool category with this name
    #[error("Category '{category}' not found")]
    UnknownCategory {
        /// Requested category
        category: String,
    },

    /// The argument object does not have the tool's shape
    #[error("Malformed arguments for tool '{tool}': {reason}")]
    MalformedArguments {
        /// Tool being invoked
        tool: String,
        /// Deserialization error
        reason: String,
    },

    /// The tool result could not be encoded
    #[error("Failed to encode result: {reason}")]
    Encoding {
        /// Serialization error
        reason: String,
    },
}

impl ToolError {
    /// Stable reason code.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::UnknownInstance { .. } => "UnknownInstance",
            Self::NoPendingDeletion { .. } => "NoPendingDeletion",
            Self::TokenMismatch { .. } => "TokenMismatch",
            Self::NoMatchingRecords { .. } => "NoMatchingRecords",
            Self::LookupFailed { .. } => "LookupFailed",
            Self::InvalidArgument { .. } => "InvalidArgument",
            Self::UnknownTool { .. } => "UnknownTool",
            Self::UnknownCategory { .. } => "UnknownCategory",
            Self::MalformedArguments { .. } => "MalformedArguments",
            Self::Encoding { .. } => "EncodingFailed",
        }
    }

    pub(crate) fn invalid_argument(argument: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
