// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pi-hole appliance access.
//!
//! This module defines the [`ApplianceClient`] seam the rest of the crate talks
//! through, and [`PiholeClient`], its implementation over the Pi-hole v6 REST API.
//!
//! # Architecture
//!
//! Every fan-out operation authenticates against its instance first and then
//! issues calls with the returned [`Session`]. The session is an opaque capability
//! scoped to one instance; acquiring, caching and renewing it is the client's
//! concern, not the caller's.
//!
//! # Example
//!
//! ```rust,no_run
//! use pihole_dns::appliance::{ApplianceClient, PiholeClient};
//! use pihole_dns::registry::InstanceRegistry;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let registry = InstanceRegistry::from_env()?;
//! let client = PiholeClient::new(false)?;
//!
//! let session = client.authenticate(&registry.instances()[0]).await?;
//! let records = client.list_local_dns(&session).await?;
//! # Ok(())
//! # }
//! ```

pub mod pihole;

pub use pihole::PiholeClient;

use crate::errors::ApplianceError;
use crate::types::{DnsRecord, Instance};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;

/// Authenticated capability for one instance.
#[derive(Clone)]
pub struct Session {
    instance: Instance,
    sid: Option<String>,
}

impl Session {
    /// Create a session for `instance`. `sid` is `None` when the appliance has no password.
    #[must_use]
    pub fn new(instance: Instance, sid: Option<String>) -> Self {
        Self { instance, sid }
    }

    /// Instance this session belongs to.
    #[must_use]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Session id sent with every request.
    #[must_use]
    pub fn sid(&self) -> Option<&str> {
        self.sid.as_deref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("instance", &self.instance.name)
            .field("sid", &self.sid.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Filters for the query log, mirroring Pi-hole's `/api/queries` parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueryParams {
    /// Number of queries to return
    pub length: Option<u32>,
    /// Unix timestamp lower bound
    pub from: Option<i64>,
    /// Unix timestamp upper bound
    pub until: Option<i64>,
    /// Upstream destination (`cache`, `blocklist`, `permitted` or a server)
    pub upstream: Option<String>,
    /// Domain filter, `*` wildcards allowed
    pub domain: Option<String>,
    /// Client filter, `*` wildcards allowed
    pub client: Option<String>,
    /// Pagination cursor from a previous response
    pub cursor: Option<String>,
}

/// Operations the core needs from a Pi-hole instance.
///
/// Implementations normalize every failure into an [`ApplianceError`] naming the
/// instance, so the fan-out executor can report it inline.
#[async_trait]
pub trait ApplianceClient: Send + Sync {
    /// Obtain a session for `instance`, reusing a cached one when still valid.
    async fn authenticate(&self, instance: &Instance) -> Result<Session, ApplianceError>;

    /// Current local A and CNAME records, in appliance order (A records first).
    async fn list_local_dns(&self, session: &Session) -> Result<Vec<DnsRecord>, ApplianceError>;

    /// Store a local record.
    async fn add_record(&self, session: &Session, record: &DnsRecord)
        -> Result<(), ApplianceError>;

    /// Remove exactly this local record.
    async fn delete_record(
        &self,
        session: &Session,
        record: &DnsRecord,
    ) -> Result<(), ApplianceError>;

    /// Recent entries of the query log.
    async fn queries(
        &self,
        session: &Session,
        params: &QueryParams,
    ) -> Result<serde_json::Value, ApplianceError>;

    /// Activity graph data (queries over time).
    async fn query_history(&self, session: &Session) -> Result<serde_json::Value, ApplianceError>;

    /// Suggested values for the query log filters.
    async fn query_suggestions(
        &self,
        session: &Session,
    ) -> Result<serde_json::Value, ApplianceError>;
}
