// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Core data types shared by the registry, the appliance adapter and the tool surface.

use crate::errors::ApplianceError;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use url::Url;

/// Secret used to authenticate against a Pi-hole instance.
///
/// The value never appears in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a password.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the secret for the authentication request.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// One configured Pi-hole endpoint. Immutable after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Unique display name (registry key)
    pub name: String,
    /// Normalized base URL, without `/api` or `/admin` suffix
    pub base_url: Url,
    /// Web interface / app password
    pub credential: Credential,
}

impl Instance {
    /// Create an instance description.
    #[must_use]
    pub fn new(name: impl Into<String>, base_url: Url, credential: Credential) -> Self {
        Self {
            name: name.into(),
            base_url,
            credential,
        }
    }
}

/// Local DNS record types managed by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    /// Hostname to IP address
    A,
    /// Hostname to canonical hostname
    #[serde(rename = "CNAME")]
    Cname,
}

impl RecordType {
    /// Record type as written in DNS terminology.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Cname => "CNAME",
        }
    }

    /// Pi-hole config path holding records of this type.
    #[must_use]
    pub const fn config_path(self) -> &'static str {
        match self {
            Self::A => crate::constants::HOSTS_CONFIG_PATH,
            Self::Cname => crate::constants::CNAME_CONFIG_PATH,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A local DNS override as stored on one Pi-hole.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DnsRecord {
    /// A or CNAME
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Hostname being overridden
    pub hostname: String,
    /// IP address (A) or canonical name (CNAME)
    pub target: String,
    /// CNAME TTL when the appliance entry carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

impl DnsRecord {
    /// Build an A record.
    #[must_use]
    pub fn a(hostname: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            record_type: RecordType::A,
            hostname: hostname.into(),
            target: ip.into(),
            ttl: None,
        }
    }

    /// Build a CNAME record.
    #[must_use]
    pub fn cname(hostname: impl Into<String>, target: impl Into<String>, ttl: Option<u32>) -> Self {
        Self {
            record_type: RecordType::Cname,
            hostname: hostname.into(),
            target: target.into(),
            ttl,
        }
    }

    /// Render the record the way Pi-hole stores it in its config arrays.
    ///
    /// A records are `"<ip> <host>"`, CNAME records `"<host>,<target>[,<ttl>]"`.
    #[must_use]
    pub fn appliance_entry(&self) -> String {
        match self.record_type {
            RecordType::A => format!("{} {}", self.target, self.hostname),
            RecordType::Cname => match self.ttl {
                Some(ttl) => format!("{},{},{ttl}", self.hostname, self.target),
                None => format!("{},{}", self.hostname, self.target),
            },
        }
    }

    /// Parse one Pi-hole config array entry.
    ///
    /// Returns `None` for entries that do not have the expected shape.
    #[must_use]
    pub fn parse_entry(record_type: RecordType, entry: &str) -> Option<Self> {
        match record_type {
            RecordType::A => {
                let (ip, hostname) = entry.trim().split_once(char::is_whitespace)?;
                let hostname = hostname.trim();
                if ip.is_empty() || hostname.is_empty() {
                    return None;
                }
                Some(Self::a(hostname, ip))
            }
            RecordType::Cname => {
                let mut parts = entry.trim().split(',').map(str::trim);
                let hostname = parts.next().filter(|h| !h.is_empty())?;
                let target = parts.next().filter(|t| !t.is_empty())?;
                let ttl = parts.next().and_then(|ttl| ttl.parse().ok());
                Some(Self::cname(hostname, target, ttl))
            }
        }
    }
}

impl fmt::Display for DnsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.record_type, self.hostname, self.target)
    }
}

/// Records captured for one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceRecords {
    /// Instance name
    pub instance: String,
    /// Records in appliance order
    pub records: Vec<DnsRecord>,
}

/// Current local DNS overrides of one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocalDnsListing {
    /// Local A records
    pub a_records: Vec<DnsRecord>,
    /// Local CNAME records
    pub cname_records: Vec<DnsRecord>,
}

/// Outcome of one operation on one instance.
///
/// Serializes to `{instance, succeeded, data}` or `{instance, succeeded, error, reason}`.
#[derive(Debug, Clone)]
pub struct OperationResult<T> {
    /// Instance the operation ran against
    pub instance: String,
    /// Operation data or the isolated per-instance failure
    pub outcome: Result<T, ApplianceError>,
}

impl<T> OperationResult<T> {
    /// Whether the operation succeeded on this instance.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Successful data, if any.
    #[must_use]
    pub fn data(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    /// Failure, if any.
    #[must_use]
    pub fn error(&self) -> Option<&ApplianceError> {
        self.outcome.as_ref().err()
    }
}

impl<T: Serialize> Serialize for OperationResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("OperationResult", 4)?;
        state.serialize_field("instance", &self.instance)?;
        state.serialize_field("succeeded", &self.outcome.is_ok())?;
        match &self.outcome {
            Ok(data) => state.serialize_field("data", data)?,
            Err(e) => {
                state.serialize_field("error", &e.to_string())?;
                state.serialize_field("reason", e.reason())?;
            }
        }
        state.end()
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
