// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # pihole-dns - Local DNS management across Pi-hole instances
//!
//! pihole-dns exposes a small set of tools that an automated agent can call to
//! inspect and change the local A and CNAME records of up to four Pi-hole
//! appliances at once.
//!
//! ## Overview
//!
//! - Every tool fans out to the selected instances concurrently and reports
//!   one result per instance, in registry order
//! - One slow or failing appliance never blocks or fails the others
//! - Deletions are two-step: a preview returns a single-use confirmation token
//!   that expires after ten minutes, and only a matching token deletes
//!
//! ## Modules
//!
//! - [`registry`] - Configured instances and target resolution
//! - [`appliance`] - Pi-hole API client
//! - [`fanout`] - Concurrent, isolated per-instance execution
//! - [`matcher`] - Exact record matching
//! - [`tokens`] - Pending deletions and confirmation tokens
//! - [`tools`] - The tool surface
//! - [`server`] - HTTP/JSON transport
//!
//! ## Example
//!
//! ```rust,no_run
//! use pihole_dns::appliance::PiholeClient;
//! use pihole_dns::registry::InstanceRegistry;
//! use pihole_dns::tools::DnsTools;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let registry = InstanceRegistry::from_env()?;
//! let tools = DnsTools::new(registry, Arc::new(PiholeClient::new(false)?));
//!
//! let preview = tools
//!     .call("remove_local_a_record", serde_json::json!({ "hostname": "nas.lan" }))
//!     .await?;
//! println!("{preview}");
//! # Ok(())
//! # }
//! ```

pub mod appliance;
pub mod config;
pub mod constants;
pub mod discovery;
pub mod errors;
pub mod fanout;
pub mod http_errors;
pub mod matcher;
pub mod metrics;
pub mod registry;
pub mod retry;
pub mod server;
pub mod tokens;
pub mod tools;
pub mod types;

#[cfg(test)]
mod test_support;
