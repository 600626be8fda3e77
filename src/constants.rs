// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for pihole-dns.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Instance Registry Constants
// ============================================================================

/// Maximum number of Pi-hole instances that can be configured
pub const MAX_INSTANCES: usize = 4;

/// Environment variable suffix for an instance base URL
pub const ENV_URL_SUFFIX: &str = "_URL";

/// Environment variable suffix for an instance password
pub const ENV_PASSWORD_SUFFIX: &str = "_PASSWORD";

/// Environment variable suffix for an instance display name
pub const ENV_NAME_SUFFIX: &str = "_NAME";

/// Environment variable prefixes for the instance slots, in registry order
pub const INSTANCE_ENV_PREFIXES: [&str; MAX_INSTANCES] = ["PIHOLE", "PIHOLE2", "PIHOLE3", "PIHOLE4"];

// ============================================================================
// Confirmation Token Constants
// ============================================================================

/// Lifetime of a pending deletion before its token expires (10 minutes)
pub const PENDING_DELETION_TTL_SECS: u64 = 600;

/// Number of random bytes in a confirmation token (256 bits)
pub const CONFIRMATION_TOKEN_BYTES: usize = 32;

/// Number of token characters that may appear in logs
pub const TOKEN_LOG_PREFIX_LEN: usize = 8;

/// Default interval between sweeps of expired pending deletions
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

// ============================================================================
// Fan-Out Constants
// ============================================================================

/// Ceiling for a single per-instance operation during fan-out (30 seconds)
pub const DEFAULT_INSTANCE_TIMEOUT_SECS: u64 = 30;

/// Per-request timeout for the Pi-hole HTTP client
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Retry Constants
// ============================================================================

/// Delay before the first retry of a transient Pi-hole failure
pub const RETRY_INITIAL_DELAY_MILLIS: u64 = 50;

/// Upper bound for a single retry delay
pub const RETRY_MAX_DELAY_SECS: u64 = 2;

/// Total retry time per request; kept well below the fan-out ceiling
pub const RETRY_BUDGET_SECS: u64 = 8;

/// Relative jitter applied to each retry delay (±10%)
pub const RETRY_JITTER: f64 = 0.1;

// ============================================================================
// Pi-hole API Constants
// ============================================================================

/// Header carrying the Pi-hole session id
pub const SESSION_HEADER: &str = "X-FTL-SID";

/// Seconds subtracted from a session's validity before it is renewed
pub const SESSION_RENEWAL_MARGIN_SECS: u64 = 30;

/// Config path for local A records (`"<ip> <host>"` entries)
pub const HOSTS_CONFIG_PATH: &str = "dns/hosts";

/// Config path for local CNAME records (`"<host>,<target>[,<ttl>]"` entries)
pub const CNAME_CONFIG_PATH: &str = "dns/cnameRecords";

/// Default TTL written into new CNAME entries
pub const DEFAULT_CNAME_TTL_SECS: u32 = 300;

/// Default number of queries returned by `list_queries`
pub const DEFAULT_QUERY_LENGTH: u32 = 10;

// ============================================================================
// HTTP Server Constants
// ============================================================================

/// Default listen address for the tool-call HTTP surface
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8383";
