// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Confirmation token store for two-phase record removal.
//!
//! Each `(record type, hostname)` key moves through a small state machine:
//!
//! ```text
//! absent --preview--> pending --confirm(match)--> consumed (entry removed)
//!                        |  \
//!                        |   +--preview--> pending (new token, old one superseded)
//!                        +--now > expires_at--> expired (entry removed, same as absent)
//! ```
//!
//! Expiry is evaluated lazily on every `preview` and `confirm`.
//! [`ConfirmationStore::purge_expired`] only reclaims memory.
//!
//! Absent, consumed and expired keys all produce [`ToolError::NoPendingDeletion`]
//! so a caller cannot tell a stale token from one that never existed.

use crate::constants::{CONFIRMATION_TOKEN_BYTES, PENDING_DELETION_TTL_SECS, TOKEN_LOG_PREFIX_LEN};
use crate::errors::ToolError;
use crate::metrics::{record_confirmation_event, set_pending_deletions};
use crate::types::{InstanceRecords, RecordType};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A removal awaiting confirmation.
#[derive(Clone, Serialize)]
pub struct PendingDeletion {
    /// Opaque confirmation token
    pub token: String,
    /// When the preview was issued
    pub created_at: DateTime<Utc>,
    /// After this instant the token is no longer accepted
    pub expires_at: DateTime<Utc>,
    /// Record type being removed
    pub record_type: RecordType,
    /// Hostname being removed
    pub hostname: String,
    /// Records that confirm will delete, per instance in targeting order
    pub affected: Vec<InstanceRecords>,
}

impl PendingDeletion {
    /// Total number of records across all instances.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.affected.iter().map(|entry| entry.records.len()).sum()
    }

    /// Human-readable list of what will be removed, e.g. `pihole: 10.0.0.5; pihole2: 10.0.0.5`.
    #[must_use]
    pub fn describe(&self) -> String {
        self.affected
            .iter()
            .map(|entry| {
                let targets: Vec<&str> = entry.records.iter().map(|r| r.target.as_str()).collect();
                format!("{}: {}", entry.instance, targets.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Debug for PendingDeletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingDeletion")
            .field("token", &token_prefix(&self.token))
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .field("record_type", &self.record_type)
            .field("hostname", &self.hostname)
            .field("affected", &self.affected)
            .finish()
    }
}

type PendingKey = (RecordType, String);

/// State of a key at confirm time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    Absent,
    Expired,
    Mismatch,
    Match,
}

/// Process-wide store of pending deletions.
///
/// A single lock covers the whole map; no I/O happens while it is held, so
/// every supersede-or-create and check-and-consume is atomic.
pub struct ConfirmationStore {
    entries: Mutex<HashMap<PendingKey, PendingDeletion>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl Default for ConfirmationStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(PENDING_DELETION_TTL_SECS))
    }
}

impl ConfirmationStore {
    /// Create a store using the wall clock.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a store with an injected clock.
    #[must_use]
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            clock,
        }
    }

    /// Record a new pending deletion for `(record_type, hostname)`.
    ///
    /// Any existing entry for the key is replaced and its token stops working.
    pub fn preview(
        &self,
        record_type: RecordType,
        hostname: &str,
        affected: Vec<InstanceRecords>,
    ) -> PendingDeletion {
        let now = self.clock.now();
        let pending = PendingDeletion {
            token: generate_token(),
            created_at: now,
            expires_at: now
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            record_type,
            hostname: hostname.to_string(),
            affected,
        };

        let mut entries = self.lock();
        if let Some(previous) = entries.insert((record_type, hostname.to_string()), pending.clone())
        {
            let event = if now > previous.expires_at {
                "expired"
            } else {
                "superseded"
            };
            record_confirmation_event(event);
            debug!(
                record_type = %record_type,
                hostname = %hostname,
                token_prefix = %token_prefix(&previous.token),
                event = event,
                "Replaced previous pending deletion"
            );
        }
        set_pending_deletions(entries.len());
        drop(entries);

        record_confirmation_event("issued");
        info!(
            record_type = %record_type,
            hostname = %hostname,
            token_prefix = %token_prefix(&pending.token),
            records = pending.record_count(),
            expires_at = %pending.expires_at,
            "Issued pending deletion"
        );

        pending
    }

    /// Consume the pending deletion for `(record_type, hostname)` if `token` matches.
    ///
    /// # Errors
    ///
    /// - [`ToolError::NoPendingDeletion`] if there is no live entry (never
    ///   previewed, already consumed, or expired).
    /// - [`ToolError::TokenMismatch`] if an entry exists but `token` differs. The
    ///   entry stays pending.
    pub fn confirm(
        &self,
        record_type: RecordType,
        hostname: &str,
        token: &str,
    ) -> Result<PendingDeletion, ToolError> {
        let now = self.clock.now();
        let no_pending = || ToolError::NoPendingDeletion {
            record_type,
            hostname: hostname.to_string(),
        };

        let key = (record_type, hostname.to_string());
        let mut entries = self.lock();
        let lookup = match entries.get(&key) {
            None => Lookup::Absent,
            Some(pending) if now > pending.expires_at => Lookup::Expired,
            Some(pending) if !tokens_match(&pending.token, token) => Lookup::Mismatch,
            Some(_) => Lookup::Match,
        };
        let removed = match lookup {
            Lookup::Expired | Lookup::Match => entries.remove(&key),
            Lookup::Absent | Lookup::Mismatch => None,
        };
        set_pending_deletions(entries.len());
        drop(entries);

        match (lookup, removed) {
            (Lookup::Match, Some(pending)) => {
                record_confirmation_event("confirmed");
                info!(
                    record_type = %record_type,
                    hostname = %hostname,
                    token_prefix = %token_prefix(&pending.token),
                    records = pending.record_count(),
                    "Pending deletion confirmed"
                );
                Ok(pending)
            }
            (Lookup::Mismatch, _) => {
                record_confirmation_event("mismatched");
                info!(record_type = %record_type, hostname = %hostname, "Confirmation token mismatch");
                Err(ToolError::TokenMismatch {
                    record_type,
                    hostname: hostname.to_string(),
                })
            }
            (Lookup::Expired, _) => {
                record_confirmation_event("expired");
                info!(record_type = %record_type, hostname = %hostname, "Pending deletion expired");
                Err(no_pending())
            }
            _ => {
                record_confirmation_event("missing");
                debug!(record_type = %record_type, hostname = %hostname, "No pending deletion to confirm");
                Err(no_pending())
            }
        }
    }

    /// Drop the pending deletion for `(record_type, hostname)`, if any.
    ///
    /// Used when a fresh preview finds nothing to delete: the earlier token must
    /// stop working even though no new one is issued. Returns whether an entry
    /// was removed.
    pub fn discard(&self, record_type: RecordType, hostname: &str) -> bool {
        let now = self.clock.now();
        let mut entries = self.lock();
        let previous = entries.remove(&(record_type, hostname.to_string()));
        set_pending_deletions(entries.len());
        drop(entries);

        let Some(previous) = previous else {
            return false;
        };
        let event = if now > previous.expires_at {
            "expired"
        } else {
            "superseded"
        };
        record_confirmation_event(event);
        debug!(
            record_type = %record_type,
            hostname = %hostname,
            token_prefix = %token_prefix(&previous.token),
            event = event,
            "Discarded previous pending deletion"
        );
        true
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, pending| now <= pending.expires_at);
        let purged = before - entries.len();
        set_pending_deletions(entries.len());
        drop(entries);

        if purged > 0 {
            for _ in 0..purged {
                record_confirmation_event("expired");
            }
            debug!(purged = purged, "Purged expired pending deletions");
        }
        purged
    }

    /// Number of stored entries, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PendingKey, PendingDeletion>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Generate a 256-bit random token, URL-safe base64 without padding.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let mut bytes = [0u8; CONFIRMATION_TOKEN_BYTES];
    rng.fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compare tokens in constant time.
///
/// Both sides are hashed first so the comparison length never depends on input.
fn tokens_match(expected: &str, presented: &str) -> bool {
    let expected = Sha256::digest(expected.as_bytes());
    let presented = Sha256::digest(presented.as_bytes());
    expected
        .iter()
        .zip(presented.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn token_prefix(token: &str) -> &str {
    token.get(..TOKEN_LOG_PREFIX_LEN).unwrap_or(token)
}

#[cfg(test)]
#[path = "tokens_tests.rs"]
mod tokens_tests;
