// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry schedule for Pi-hole API calls.
//!
//! Transient errors (429, 500, 502-504, connection failures) are retried with
//! jittered exponential backoff; everything else fails on the first attempt.
//! The total budget stays well below the fan-out ceiling so a retrying
//! instance still reports its own failure instead of being cut off by the
//! executor timeout.

use crate::constants::{
    RETRY_BUDGET_SECS, RETRY_INITIAL_DELAY_MILLIS, RETRY_JITTER, RETRY_MAX_DELAY_SECS,
};
use rand::Rng;
use reqwest::StatusCode;
use std::time::{Duration, Instant};

/// Shape of a retry schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for a single delay
    pub max_delay: Duration,
    /// Total time after which no further retry is attempted; `None` retries forever
    pub budget: Option<Duration>,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
    /// Relative jitter applied to every delay (0.1 means ±10%)
    pub jitter: f64,
}

impl RetryPolicy {
    /// Schedule used for every Pi-hole request.
    ///
    /// 50ms, 100ms, 200ms, ... doubling up to 2s, until 8s have elapsed.
    pub const PIHOLE_API: Self = Self {
        initial_delay: Duration::from_millis(RETRY_INITIAL_DELAY_MILLIS),
        max_delay: Duration::from_secs(RETRY_MAX_DELAY_SECS),
        budget: Some(Duration::from_secs(RETRY_BUDGET_SECS)),
        multiplier: 2.0,
        jitter: RETRY_JITTER,
    };

    /// Start a schedule; the budget clock begins now.
    #[must_use]
    pub fn start(self) -> Backoff {
        Backoff {
            policy: self,
            next: self.initial_delay,
            started: Instant::now(),
        }
    }
}

/// A running retry schedule.
#[derive(Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    next: Duration,
    started: Instant,
}

impl Backoff {
    /// Delay before the next attempt, or `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self
            .policy
            .budget
            .is_some_and(|budget| self.started.elapsed() >= budget)
        {
            return None;
        }

        let delay = self.next;
        self.next = delay.mul_f64(self.policy.multiplier).min(self.policy.max_delay);
        Some(jittered(delay, self.policy.jitter))
    }

    /// Time since the schedule started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

fn jittered(delay: Duration, jitter: f64) -> Duration {
    if jitter <= 0.0 {
        return delay;
    }
    let secs = delay.as_secs_f64();
    let spread = secs * jitter;
    let picked = rand::thread_rng().gen_range(secs - spread..=secs + spread);
    Duration::from_secs_f64(picked.max(0.0))
}

/// Whether a Pi-hole response status is worth another attempt.
///
/// - **429**: API session seats exhausted
/// - **500**: FTL busy
/// - **502**/**504**: reverse proxy in front of the appliance
/// - **503**: FTL restarting
#[must_use]
pub fn is_retryable_http_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
