// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Pi-hole DNS tool server.
//!
//! All metrics carry the namespace prefix `pihole_dns_`.
//!
//! # Metrics Categories
//!
//! - **Tool Metrics** - Track tool invocations and their outcomes
//! - **Instance Metrics** - Track per-instance operations inside fan-outs
//! - **Confirmation Metrics** - Track the preview/confirm token lifecycle
//!
//! # Example
//!
//! ```rust,no_run
//! use pihole_dns::metrics::record_tool_success;
//!
//! record_tool_success("list_local_dns", std::time::Duration::from_millis(120));
//! ```

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics
const METRICS_NAMESPACE: &str = "pihole_dns";

/// Outcome label for successful operations
pub const OUTCOME_SUCCESS: &str = "success";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Tool Metrics
// ============================================================================

/// Total number of tool calls by tool and outcome
///
/// Labels:
/// - `tool`: Tool name (e.g., `list_local_dns`)
/// - `outcome`: `success` or the error reason code
pub static TOOL_CALLS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_tool_calls_total"),
        "Total number of tool calls by tool and outcome",
    );
    let counter = CounterVec::new(opts, &["tool", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of tool calls in seconds
///
/// Labels:
/// - `tool`: Tool name
pub static TOOL_CALL_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_tool_call_duration_seconds"),
        "Duration of tool calls in seconds by tool",
    )
    .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]);
    let histogram = HistogramVec::new(opts, &["tool"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Instance Metrics
// ============================================================================

/// Total number of per-instance operations by instance and outcome
///
/// Labels:
/// - `instance`: Pi-hole instance name
/// - `outcome`: `success` or the failure reason code (e.g., `UpstreamTimeout`)
pub static INSTANCE_OPERATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_instance_operations_total"),
        "Total number of per-instance operations by instance and outcome",
    );
    let counter = CounterVec::new(opts, &["instance", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of per-instance operations in seconds
///
/// Labels:
/// - `instance`: Pi-hole instance name
pub static INSTANCE_OPERATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_instance_operation_duration_seconds"),
        "Duration of per-instance operations in seconds",
    )
    .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]);
    let histogram = HistogramVec::new(opts, &["instance"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Confirmation Metrics
// ============================================================================

/// Confirmation token lifecycle events
///
/// Labels:
/// - `event`: `issued`, `superseded`, `confirmed`, `mismatched`, `expired`, `missing`
pub static CONFIRMATION_EVENTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_confirmation_events_total"),
        "Confirmation token lifecycle events",
    );
    let counter = CounterVec::new(opts, &["event"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Number of deletions currently awaiting confirmation
pub static PENDING_DELETIONS: LazyLock<IntGauge> = LazyLock::new(|| {
    let gauge = IntGauge::new(
        format!("{METRICS_NAMESPACE}_pending_deletions"),
        "Number of deletions currently awaiting confirmation",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(gauge.clone()))
        .unwrap();
    gauge
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful tool call
///
/// # Arguments
/// * `tool` - Tool name
/// * `duration` - Duration of the call
pub fn record_tool_success(tool: &str, duration: Duration) {
    TOOL_CALLS_TOTAL
        .with_label_values(&[tool, OUTCOME_SUCCESS])
        .inc();
    TOOL_CALL_DURATION_SECONDS
        .with_label_values(&[tool])
        .observe(duration.as_secs_f64());
}

/// Record a failed tool call
///
/// # Arguments
/// * `tool` - Tool name
/// * `reason` - Error reason code (e.g., `TokenMismatch`)
/// * `duration` - Duration of the call before failure
pub fn record_tool_error(tool: &str, reason: &str, duration: Duration) {
    TOOL_CALLS_TOTAL.with_label_values(&[tool, reason]).inc();
    TOOL_CALL_DURATION_SECONDS
        .with_label_values(&[tool])
        .observe(duration.as_secs_f64());
}

/// Record the outcome of one instance's share of a fan-out
///
/// # Arguments
/// * `instance` - Pi-hole instance name
/// * `outcome` - [`OUTCOME_SUCCESS`] or a failure reason code
/// * `duration` - Time the instance took (or the timeout)
pub fn record_instance_operation(instance: &str, outcome: &str, duration: Duration) {
    INSTANCE_OPERATIONS_TOTAL
        .with_label_values(&[instance, outcome])
        .inc();
    INSTANCE_OPERATION_DURATION_SECONDS
        .with_label_values(&[instance])
        .observe(duration.as_secs_f64());
}

/// Record a confirmation token lifecycle event
pub fn record_confirmation_event(event: &str) {
    CONFIRMATION_EVENTS_TOTAL.with_label_values(&[event]).inc();
}

/// Publish the current number of pending deletions
pub fn set_pending_deletions(count: usize) {
    PENDING_DELETIONS.set(i64::try_from(count).unwrap_or(i64::MAX));
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
