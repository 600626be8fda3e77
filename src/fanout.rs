// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Concurrent per-instance execution.
//!
//! [`FanOutExecutor::run`] starts one task per selected instance, bounds each by
//! the configured timeout and returns one [`OperationResult`] per instance in the
//! same order the instances were given. A failure, panic or timeout on one
//! instance becomes that instance's result and never touches the others.
//!
//! A timed-out task is detached, not aborted. Its late completion is discarded,
//! so a write may still land on the appliance after being reported as timed out.

use crate::constants::DEFAULT_INSTANCE_TIMEOUT_SECS;
use crate::errors::ApplianceError;
use crate::metrics::{record_instance_operation, OUTCOME_SUCCESS};
use crate::types::{Instance, OperationResult};
use futures::future::join_all;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Runs one operation against many instances concurrently.
#[derive(Debug, Clone, Copy)]
pub struct FanOutExecutor {
    timeout: Duration,
}

impl Default for FanOutExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_INSTANCE_TIMEOUT_SECS))
    }
}

impl FanOutExecutor {
    /// Create an executor with a per-instance timeout.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Per-instance timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Apply `op` to every instance concurrently.
    ///
    /// The returned vector has exactly one entry per input instance, in input
    /// order, regardless of completion order.
    pub async fn run<T, F, Fut>(&self, instances: &[Instance], op: F) -> Vec<OperationResult<T>>
    where
        F: Fn(Instance) -> Fut,
        Fut: Future<Output = Result<T, ApplianceError>> + Send + 'static,
        T: Send + 'static,
    {
        let timeout = self.timeout;

        let pending = instances.iter().map(|instance| {
            let name = instance.name.clone();
            let started = Instant::now();
            let handle = tokio::spawn(op(instance.clone()));

            async move {
                let outcome = match tokio::time::timeout(timeout, handle).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(join_error)) => Err(ApplianceError::TaskFailed {
                        instance: name.clone(),
                        reason: if join_error.is_panic() {
                            "operation panicked".to_string()
                        } else {
                            "operation was cancelled".to_string()
                        },
                    }),
                    Err(_) => Err(ApplianceError::Timeout {
                        instance: name.clone(),
                        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    }),
                };

                let elapsed = started.elapsed();
                match &outcome {
                    Ok(_) => {
                        debug!(instance = %name, elapsed = ?elapsed, "Instance operation succeeded");
                        record_instance_operation(&name, OUTCOME_SUCCESS, elapsed);
                    }
                    Err(e) => {
                        warn!(
                            instance = %name,
                            elapsed = ?elapsed,
                            reason = e.reason(),
                            error = %e,
                            "Instance operation failed"
                        );
                        record_instance_operation(&name, e.reason(), elapsed);
                    }
                }

                OperationResult {
                    instance: name,
                    outcome,
                }
            }
        });

        join_all(pending).await
    }
}

#[cfg(test)]
#[path = "fanout_tests.rs"]
mod fanout_tests;
