// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tool surface.
//!
//! Each tool resolves its `instance` argument through the registry, fans the
//! work out to the selected instances and returns one result per instance in
//! registry order. Removals are two-phase:
//!
//! 1. Without `token`: current matches are looked up, a pending deletion is
//!    stored and a preview with a confirmation token is returned. Nothing changes
//!    on any appliance.
//! 2. With `token`: the pending deletion is consumed and exactly the records
//!    captured by the preview are deleted.
//!
//! # Example
//!
//! ```rust,no_run
//! use pihole_dns::appliance::PiholeClient;
//! use pihole_dns::registry::InstanceRegistry;
//! use pihole_dns::tools::DnsTools;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let tools = DnsTools::new(
//!     InstanceRegistry::from_env()?,
//!     Arc::new(PiholeClient::new(false)?),
//! );
//!
//! let preview = tools.remove_local_a_record("nas.lan", None, None).await?;
//! # Ok(())
//! # }
//! ```

use crate::appliance::{ApplianceClient, QueryParams};
use crate::constants::DEFAULT_CNAME_TTL_SECS;
use crate::discovery::find_tool;
use crate::errors::{ApplianceError, ToolError};
use crate::fanout::FanOutExecutor;
use crate::matcher::{matching_records, RecordMatcher};
use crate::metrics::{record_tool_error, record_tool_success};
use crate::registry::InstanceRegistry;
use crate::tokens::{ConfirmationStore, PendingDeletion};
use crate::types::{
    DnsRecord, Instance, InstanceRecords, LocalDnsListing, OperationResult, RecordType,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

// ============================================================================
// Arguments
// ============================================================================

/// Arguments of tools that only take an optional target.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceArgs {
    /// Instance name; all instances when omitted
    #[serde(default)]
    pub instance: Option<String>,
}

/// Arguments of `add_local_a_record`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddARecordArgs {
    /// Hostname to override
    pub hostname: String,
    /// IPv4 or IPv6 address
    pub ip: String,
    /// Instance name; all instances when omitted
    #[serde(default)]
    pub instance: Option<String>,
}

/// Arguments of `add_local_cname_record`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddCnameRecordArgs {
    /// Alias hostname
    pub hostname: String,
    /// Canonical hostname
    pub target: String,
    /// TTL written into the appliance entry
    #[serde(default)]
    pub ttl: Option<u32>,
    /// Instance name; all instances when omitted
    #[serde(default)]
    pub instance: Option<String>,
}

/// Arguments of the removal tools.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoveRecordArgs {
    /// Hostname whose records are removed
    pub hostname: String,
    /// Instance name; all instances when omitted
    #[serde(default)]
    pub instance: Option<String>,
    /// Confirmation token from a previous preview
    #[serde(default)]
    pub token: Option<String>,
}

/// Arguments of `list_queries`.
#[derive(Debug, Default, Deserialize)]
pub struct QueryArgs {
    /// Instance name; all instances when omitted
    #[serde(default)]
    pub instance: Option<String>,
    /// Query log filters
    #[serde(flatten)]
    pub params: QueryParams,
}

// ============================================================================
// Responses
// ============================================================================

/// Whether an add changed the appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddStatus {
    /// Record was written
    Added,
    /// An identical record was already present
    Exists,
}

/// Per-instance data of the add tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddOutcome {
    /// What happened
    pub status: AddStatus,
    /// Appliance entry, e.g. `"192.168.1.50 nas.lan"`
    pub record: String,
}

/// Instance whose lookup failed during a preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupFailure {
    /// Instance name
    pub instance: String,
    /// Error message
    pub error: String,
    /// Reason code
    pub reason: &'static str,
}

/// First-phase removal response.
#[derive(Debug, Clone, Serialize)]
pub struct RemovalPreview {
    /// Always `pending_deletion`
    pub status: &'static str,
    /// Token to pass back to confirm
    pub token: String,
    /// After this instant the token is rejected
    pub expires_at: DateTime<Utc>,
    /// Record type
    pub record_type: RecordType,
    /// Hostname
    pub hostname: String,
    /// Records that will be deleted, per instance
    pub affected: Vec<InstanceRecords>,
    /// Instances that could not be queried and are excluded from the deletion
    pub failures: Vec<LookupFailure>,
    /// Human-readable summary
    pub message: String,
}

/// Per-instance data of a confirmed removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletedRecords {
    /// Records removed from this instance
    pub deleted: Vec<DnsRecord>,
}

/// Second-phase removal response.
#[derive(Debug, Clone, Serialize)]
pub struct RemovalResult {
    /// Always `deleted`
    pub status: &'static str,
    /// Hostname
    pub hostname: String,
    /// Record type
    pub record_type: RecordType,
    /// One result per affected instance
    pub results: Vec<OperationResult<DeletedRecords>>,
    /// Human-readable summary
    pub message: String,
}

/// Response of a removal tool, depending on the phase.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RemovalResponse {
    /// No token was given
    Preview(RemovalPreview),
    /// A token was given and accepted
    Deleted(RemovalResult),
}

// ============================================================================
// Tools
// ============================================================================

/// The local DNS and query log tools.
pub struct DnsTools {
    registry: InstanceRegistry,
    client: Arc<dyn ApplianceClient>,
    executor: FanOutExecutor,
    matcher: RecordMatcher,
    store: Arc<ConfirmationStore>,
}

impl DnsTools {
    /// Create tools with the default timeout and confirmation TTL.
    #[must_use]
    pub fn new(registry: InstanceRegistry, client: Arc<dyn ApplianceClient>) -> Self {
        Self::with_parts(
            registry,
            client,
            FanOutExecutor::default(),
            Arc::new(ConfirmationStore::default()),
        )
    }

    /// Create tools from explicit collaborators.
    #[must_use]
    pub fn with_parts(
        registry: InstanceRegistry,
        client: Arc<dyn ApplianceClient>,
        executor: FanOutExecutor,
        store: Arc<ConfirmationStore>,
    ) -> Self {
        Self {
            registry,
            matcher: RecordMatcher::new(Arc::clone(&client)),
            client,
            executor,
            store,
        }
    }

    /// Instance registry.
    #[must_use]
    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    /// Confirmation store shared with the housekeeping task.
    #[must_use]
    pub fn store(&self) -> &Arc<ConfirmationStore> {
        &self.store
    }

    /// Invoke a tool by name with a JSON argument object.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] for unknown names,
    /// [`ToolError::MalformedArguments`] if `args` does not fit the tool, and
    /// any error the tool itself returns.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let Some(tool) = find_tool(name) else {
            warn!(tool = %name, "Unknown tool requested");
            record_tool_error("unknown", "UnknownTool", Duration::ZERO);
            return Err(ToolError::UnknownTool {
                name: name.to_string(),
            });
        };

        let started = Instant::now();
        let result = self.dispatch(tool.name, args).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(_) => {
                info!(tool = tool.name, elapsed = ?elapsed, "Tool call succeeded");
                record_tool_success(tool.name, elapsed);
            }
            Err(e) => {
                warn!(tool = tool.name, elapsed = ?elapsed, reason = e.reason(), error = %e, "Tool call failed");
                record_tool_error(tool.name, e.reason(), elapsed);
            }
        }
        result
    }

    async fn dispatch(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        match name {
            "list_local_dns" => {
                let args: InstanceArgs = parse_args(name, args)?;
                to_json(&self.list_local_dns(args.instance.as_deref()).await?)
            }
            "add_local_a_record" => {
                let args: AddARecordArgs = parse_args(name, args)?;
                to_json(
                    &self
                        .add_local_a_record(&args.hostname, &args.ip, args.instance.as_deref())
                        .await?,
                )
            }
            "add_local_cname_record" => {
                let args: AddCnameRecordArgs = parse_args(name, args)?;
                to_json(
                    &self
                        .add_local_cname_record(
                            &args.hostname,
                            &args.target,
                            args.ttl,
                            args.instance.as_deref(),
                        )
                        .await?,
                )
            }
            "remove_local_a_record" | "remove_local_cname_record" => {
                let args: RemoveRecordArgs = parse_args(name, args)?;
                let record_type = if name == "remove_local_a_record" {
                    RecordType::A
                } else {
                    RecordType::Cname
                };
                to_json(
                    &self
                        .remove_record(
                            record_type,
                            &args.hostname,
                            args.instance.as_deref(),
                            args.token.as_deref(),
                        )
                        .await?,
                )
            }
            "list_queries" => {
                let args: QueryArgs = parse_args(name, args)?;
                to_json(
                    &self
                        .list_queries(args.instance.as_deref(), &args.params)
                        .await?,
                )
            }
            "list_query_history" => {
                let args: InstanceArgs = parse_args(name, args)?;
                to_json(&self.list_query_history(args.instance.as_deref()).await?)
            }
            "list_query_suggestions" => {
                let args: InstanceArgs = parse_args(name, args)?;
                to_json(&self.list_query_suggestions(args.instance.as_deref()).await?)
            }
            _ => Err(ToolError::UnknownTool {
                name: name.to_string(),
            }),
        }
    }

    /// Current local A and CNAME records per targeted instance.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownInstance`] for an unknown `instance`.
    pub async fn list_local_dns(
        &self,
        instance: Option<&str>,
    ) -> Result<Vec<OperationResult<LocalDnsListing>>, ToolError> {
        let targets = self.registry.resolve(instance)?;
        let client = Arc::clone(&self.client);

        Ok(self
            .executor
            .run(&targets, move |instance| {
                let client = Arc::clone(&client);
                async move {
                    let session = client.authenticate(&instance).await?;
                    let records = client.list_local_dns(&session).await?;
                    let (a_records, cname_records): (Vec<DnsRecord>, Vec<DnsRecord>) = records
                        .into_iter()
                        .partition(|record| record.record_type == RecordType::A);
                    Ok::<_, ApplianceError>(LocalDnsListing {
                        a_records,
                        cname_records,
                    })
                }
            })
            .await)
    }

    /// Add a local A record on every targeted instance.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArgument`] for a bad hostname or IP and
    /// [`ToolError::UnknownInstance`] for an unknown `instance`.
    pub async fn add_local_a_record(
        &self,
        hostname: &str,
        ip: &str,
        instance: Option<&str>,
    ) -> Result<Vec<OperationResult<AddOutcome>>, ToolError> {
        let hostname = validate_hostname("hostname", hostname)?;
        let ip = ip.trim();
        let ip: IpAddr = ip
            .parse()
            .map_err(|_| ToolError::invalid_argument("ip", format!("'{ip}' is not an IP address")))?;
        let targets = self.registry.resolve(instance)?;

        Ok(self.add_record(&targets, DnsRecord::a(hostname, ip.to_string())).await)
    }

    /// Add a local CNAME record on every targeted instance.
    ///
    /// `ttl` defaults to 300 seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArgument`] for a bad hostname or target and
    /// [`ToolError::UnknownInstance`] for an unknown `instance`.
    pub async fn add_local_cname_record(
        &self,
        hostname: &str,
        target: &str,
        ttl: Option<u32>,
        instance: Option<&str>,
    ) -> Result<Vec<OperationResult<AddOutcome>>, ToolError> {
        let hostname = validate_hostname("hostname", hostname)?;
        let target = validate_hostname("target", target)?;
        if hostname == target {
            return Err(ToolError::invalid_argument(
                "target",
                "a CNAME cannot point to itself",
            ));
        }
        let targets = self.registry.resolve(instance)?;
        let record = DnsRecord::cname(hostname, target, Some(ttl.unwrap_or(DEFAULT_CNAME_TTL_SECS)));

        Ok(self.add_record(&targets, record).await)
    }

    /// Remove local A records for `hostname`, in two phases.
    ///
    /// # Errors
    ///
    /// See [`DnsTools::remove_record`].
    pub async fn remove_local_a_record(
        &self,
        hostname: &str,
        instance: Option<&str>,
        token: Option<&str>,
    ) -> Result<RemovalResponse, ToolError> {
        self.remove_record(RecordType::A, hostname, instance, token)
            .await
    }

    /// Remove local CNAME records for `hostname`, in two phases.
    ///
    /// # Errors
    ///
    /// See [`DnsTools::remove_record`].
    pub async fn remove_local_cname_record(
        &self,
        hostname: &str,
        instance: Option<&str>,
        token: Option<&str>,
    ) -> Result<RemovalResponse, ToolError> {
        self.remove_record(RecordType::Cname, hostname, instance, token)
            .await
    }

    /// Preview (no `token`) or confirm (with `token`) a removal.
    ///
    /// On confirm, `instance` is only validated: the deletion always targets
    /// the instances and records captured by the preview.
    ///
    /// # Errors
    ///
    /// - [`ToolError::InvalidArgument`] for a bad hostname or empty token
    /// - [`ToolError::UnknownInstance`] for an unknown `instance`
    /// - [`ToolError::NoMatchingRecords`] if nothing matches on any instance
    /// - [`ToolError::LookupFailed`] if nothing matches and some instances failed
    /// - [`ToolError::NoPendingDeletion`] / [`ToolError::TokenMismatch`] on confirm
    pub async fn remove_record(
        &self,
        record_type: RecordType,
        hostname: &str,
        instance: Option<&str>,
        token: Option<&str>,
    ) -> Result<RemovalResponse, ToolError> {
        let hostname = validate_hostname("hostname", hostname)?;
        let targets = self.registry.resolve(instance)?;

        match token {
            None => self
                .preview_removal(record_type, hostname, &targets)
                .await
                .map(RemovalResponse::Preview),
            Some(token) if token.is_empty() => {
                Err(ToolError::invalid_argument("token", "must not be empty"))
            }
            Some(token) => self
                .confirm_removal(record_type, hostname, token)
                .await
                .map(RemovalResponse::Deleted),
        }
    }

    /// Recent queries per targeted instance.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownInstance`] for an unknown `instance`.
    pub async fn list_queries(
        &self,
        instance: Option<&str>,
        params: &QueryParams,
    ) -> Result<Vec<OperationResult<Value>>, ToolError> {
        let targets = self.registry.resolve(instance)?;
        let client = Arc::clone(&self.client);
        let params = params.clone();

        Ok(self
            .executor
            .run(&targets, move |instance| {
                let client = Arc::clone(&client);
                let params = params.clone();
                async move {
                    let session = client.authenticate(&instance).await?;
                    client.queries(&session, &params).await
                }
            })
            .await)
    }

    /// Query activity history per targeted instance.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownInstance`] for an unknown `instance`.
    pub async fn list_query_history(
        &self,
        instance: Option<&str>,
    ) -> Result<Vec<OperationResult<Value>>, ToolError> {
        let targets = self.registry.resolve(instance)?;
        let client = Arc::clone(&self.client);

        Ok(self
            .executor
            .run(&targets, move |instance| {
                let client = Arc::clone(&client);
                async move {
                    let session = client.authenticate(&instance).await?;
                    client.query_history(&session).await
                }
            })
            .await)
    }

    /// Query filter suggestions per targeted instance.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownInstance`] for an unknown `instance`.
    pub async fn list_query_suggestions(
        &self,
        instance: Option<&str>,
    ) -> Result<Vec<OperationResult<Value>>, ToolError> {
        let targets = self.registry.resolve(instance)?;
        let client = Arc::clone(&self.client);

        Ok(self
            .executor
            .run(&targets, move |instance| {
                let client = Arc::clone(&client);
                async move {
                    let session = client.authenticate(&instance).await?;
                    client.query_suggestions(&session).await
                }
            })
            .await)
    }

    async fn add_record(
        &self,
        targets: &[Instance],
        record: DnsRecord,
    ) -> Vec<OperationResult<AddOutcome>> {
        let client = Arc::clone(&self.client);

        self.executor
            .run(targets, move |instance| {
                let client = Arc::clone(&client);
                let record = record.clone();
                async move {
                    let session = client.authenticate(&instance).await?;
                    let existing = client.list_local_dns(&session).await?;
                    // CNAME entries carry their TTL, so a TTL change is a new entry
                    let entry = record.appliance_entry();
                    let present = matching_records(&existing, record.record_type, &record.hostname)
                        .iter()
                        .any(|r| r.appliance_entry() == entry);

                    let status = if present {
                        AddStatus::Exists
                    } else {
                        client.add_record(&session, &record).await?;
                        AddStatus::Added
                    };
                    Ok::<_, ApplianceError>(AddOutcome {
                        status,
                        record: record.appliance_entry(),
                    })
                }
            })
            .await
    }

    async fn preview_removal(
        &self,
        record_type: RecordType,
        hostname: &str,
        targets: &[Instance],
    ) -> Result<RemovalPreview, ToolError> {
        let matcher = self.matcher.clone();
        let host = hostname.to_string();

        let results = self
            .executor
            .run(targets, move |instance| {
                let matcher = matcher.clone();
                let host = host.clone();
                async move { matcher.find_matches(&instance, record_type, &host).await }
            })
            .await;

        let mut affected = Vec::new();
        let mut failures = Vec::new();
        for result in results {
            match result.outcome {
                Ok(records) if records.is_empty() => {}
                Ok(records) => affected.push(InstanceRecords {
                    instance: result.instance,
                    records,
                }),
                Err(e) => failures.push(LookupFailure {
                    instance: result.instance,
                    error: e.to_string(),
                    reason: e.reason(),
                }),
            }
        }

        if affected.is_empty() {
            self.store.discard(record_type, hostname);
            return Err(if failures.is_empty() {
                ToolError::NoMatchingRecords {
                    record_type,
                    hostname: hostname.to_string(),
                }
            } else {
                ToolError::LookupFailed {
                    record_type,
                    hostname: hostname.to_string(),
                    instances: failures.into_iter().map(|f| f.instance).collect(),
                }
            });
        }

        let pending = self.store.preview(record_type, hostname, affected);
        let message = preview_message(&pending, &failures);

        Ok(RemovalPreview {
            status: "pending_deletion",
            token: pending.token,
            expires_at: pending.expires_at,
            record_type,
            hostname: pending.hostname,
            affected: pending.affected,
            failures,
            message,
        })
    }

    async fn confirm_removal(
        &self,
        record_type: RecordType,
        hostname: &str,
        token: &str,
    ) -> Result<RemovalResult, ToolError> {
        let pending = self.store.confirm(record_type, hostname, token)?;

        let captured: HashMap<String, Vec<DnsRecord>> = pending
            .affected
            .iter()
            .map(|entry| (entry.instance.clone(), entry.records.clone()))
            .collect();
        let targets: Vec<Instance> = pending
            .affected
            .iter()
            .filter_map(|entry| self.registry.get(&entry.instance).cloned())
            .collect();
        let captured = Arc::new(captured);
        let client = Arc::clone(&self.client);

        let results = self
            .executor
            .run(&targets, move |instance| {
                let client = Arc::clone(&client);
                let records = captured.get(&instance.name).cloned().unwrap_or_default();
                async move { delete_records(client.as_ref(), &instance, records).await }
            })
            .await;

        let deleted: usize = results
            .iter()
            .filter_map(OperationResult::data)
            .map(|data| data.deleted.len())
            .sum();
        let failed = results.iter().filter(|r| !r.succeeded()).count();
        let mut message = format!(
            "Deleted {deleted} of {} {record_type} record(s) for '{hostname}'",
            pending.record_count()
        );
        if failed > 0 {
            message.push_str(&format!(
                "; {failed} instance(s) failed, run list_local_dns to check their state"
            ));
        }

        Ok(RemovalResult {
            status: "deleted",
            hostname: hostname.to_string(),
            record_type,
            results,
            message,
        })
    }
}

/// Delete `records` from one instance, stopping at the first failure.
async fn delete_records(
    client: &dyn ApplianceClient,
    instance: &Instance,
    records: Vec<DnsRecord>,
) -> Result<DeletedRecords, ApplianceError> {
    let session = client.authenticate(instance).await?;
    let mut deleted = Vec::with_capacity(records.len());
    for record in records {
        client.delete_record(&session, &record).await?;
        deleted.push(record);
    }
    Ok(DeletedRecords { deleted })
}

fn preview_message(pending: &PendingDeletion, failures: &[LookupFailure]) -> String {
    let tool = match pending.record_type {
        RecordType::A => "remove_local_a_record",
        RecordType::Cname => "remove_local_cname_record",
    };
    let mut message = format!(
        "{} {} record(s) for '{}' will be deleted from {} instance(s): {}. Nothing has been deleted yet. \
         To confirm, call {tool} again with the same hostname and this token before {}.",
        pending.record_count(),
        pending.record_type,
        pending.hostname,
        pending.affected.len(),
        pending.describe(),
        pending.expires_at.to_rfc3339(),
    );
    if !failures.is_empty() {
        let names: Vec<&str> = failures.iter().map(|f| f.instance.as_str()).collect();
        message.push_str(&format!(
            " Not checked (lookup failed): {}.",
            names.join(", ")
        ));
    }
    message
}

/// Trim and validate a hostname-like argument.
fn validate_hostname<'a>(argument: &str, value: &'a str) -> Result<&'a str, ToolError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ToolError::invalid_argument(argument, "must not be empty"));
    }
    if value.chars().any(|c| c.is_whitespace() || c == ',') {
        return Err(ToolError::invalid_argument(
            argument,
            format!("'{value}' must not contain whitespace or commas"),
        ));
    }
    Ok(value)
}

fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| ToolError::MalformedArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Encoding {
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tools_tests;
