// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Record matching for removals.
//!
//! A record matches when its type equals the requested type and its hostname is
//! byte-for-byte equal to the requested hostname. There is no case folding,
//! wildcard or suffix matching.

use crate::appliance::ApplianceClient;
use crate::errors::ApplianceError;
use crate::types::{DnsRecord, Instance, RecordType};
use std::sync::Arc;
use tracing::debug;

/// Records in `records` that a removal of `(record_type, hostname)` would affect,
/// in listing order.
#[must_use]
pub fn matching_records(
    records: &[DnsRecord],
    record_type: RecordType,
    hostname: &str,
) -> Vec<DnsRecord> {
    records
        .iter()
        .filter(|record| record.record_type == record_type && record.hostname == hostname)
        .cloned()
        .collect()
}

/// Looks up the current records of an instance and selects the matches.
#[derive(Clone)]
pub struct RecordMatcher {
    client: Arc<dyn ApplianceClient>,
}

impl RecordMatcher {
    /// Create a matcher over `client`.
    #[must_use]
    pub fn new(client: Arc<dyn ApplianceClient>) -> Self {
        Self { client }
    }

    /// Current records on `instance` matching `(record_type, hostname)`.
    ///
    /// An empty result is not an error.
    ///
    /// # Errors
    ///
    /// Returns the adapter error if the instance cannot be listed.
    pub async fn find_matches(
        &self,
        instance: &Instance,
        record_type: RecordType,
        hostname: &str,
    ) -> Result<Vec<DnsRecord>, ApplianceError> {
        let session = self.client.authenticate(instance).await?;
        let records = self.client.list_local_dns(&session).await?;
        let matches = matching_records(&records, record_type, hostname);

        debug!(
            instance = %instance.name,
            record_type = %record_type,
            hostname = %hostname,
            listed = records.len(),
            matched = matches.len(),
            "Matched local DNS records"
        );
        Ok(matches)
    }
}

#[cfg(test)]
#[path = "matcher_tests.rs"]
mod matcher_tests;
