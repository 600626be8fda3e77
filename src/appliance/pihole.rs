// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pi-hole v6 REST client.
//!
//! Local DNS records live in two FTL config arrays:
//!
//! - `dns.hosts`: A records as `"<ip> <hostname>"`
//! - `dns.cnameRecords`: CNAME records as `"<hostname>,<target>[,<ttl>]"`
//!
//! Reading uses `GET /api/config/dns`; each entry is added with
//! `PUT /api/config/<path>/<entry>` and removed with `DELETE` on the same path.
//! Sessions come from `POST /api/auth` and are sent as the `X-FTL-SID` header.
//!
//! Sessions are cached per instance and renewed shortly before Pi-hole expires
//! them. A request rejected with 401 renews the session once and is replayed.

use super::{ApplianceClient, QueryParams, Session};
use crate::constants::{
    DEFAULT_QUERY_LENGTH, HTTP_REQUEST_TIMEOUT_SECS, SESSION_HEADER, SESSION_RENEWAL_MARGIN_SECS,
};
use crate::errors::ApplianceError;
use crate::http_errors::{map_connection_error, map_http_error};
use crate::retry::{is_retryable_http_status, RetryPolicy};
use crate::types::{DnsRecord, Instance, RecordType};
use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

/// Failure of a single HTTP exchange, before it is attributed to an instance.
#[derive(Debug)]
enum SendError {
    Status { status: StatusCode, body: String },
    Transport(reqwest::Error),
}

impl SendError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => is_retryable_http_status(*status),
            Self::Transport(e) => e.is_connect() || e.is_timeout(),
        }
    }

    fn into_appliance_error(self, instance: &str) -> ApplianceError {
        match self {
            Self::Status { status, body } => map_http_error(instance, status.as_u16(), &body),
            Self::Transport(e) => map_connection_error(instance, &e),
        }
    }
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status { status, body } => write!(f, "HTTP {status}: {body}"),
            Self::Transport(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedSession {
    instance: Instance,
    sid: Option<String>,
    /// `None` when Pi-hole reported no expiry (password-less appliance)
    renew_at: Option<Instant>,
}

impl CachedSession {
    fn is_fresh(&self) -> bool {
        self.renew_at.map_or(true, |at| Instant::now() < at)
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    session: AuthSession,
}

#[derive(Debug, Deserialize)]
struct AuthSession {
    valid: bool,
    #[serde(default)]
    sid: Option<String>,
    /// Seconds until expiry; negative means unlimited
    #[serde(default)]
    validity: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConfigResponse {
    config: ConfigSection,
}

#[derive(Debug, Deserialize)]
struct ConfigSection {
    dns: DnsSection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DnsSection {
    #[serde(default)]
    hosts: Vec<String>,
    #[serde(default)]
    cname_records: Vec<String>,
}

/// [`ApplianceClient`] over the Pi-hole v6 HTTP API.
pub struct PiholeClient {
    http: HttpClient,
    sessions: Mutex<HashMap<String, CachedSession>>,
}

impl PiholeClient {
    /// Create a client with the default per-request timeout.
    ///
    /// `accept_invalid_certs` disables TLS verification for appliances using
    /// Pi-hole's self-signed certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new(accept_invalid_certs: bool) -> Result<Self, reqwest::Error> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECS))
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()?;
        Ok(Self::with_http_client(http))
    }

    /// Create a client around an existing `reqwest` client.
    #[must_use]
    pub fn with_http_client(http: HttpClient) -> Self {
        Self {
            http,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// End every cached session so it stops occupying an API seat on the appliance.
    pub async fn logout_all(&self) {
        let cached: Vec<CachedSession> = {
            let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
            sessions.drain().map(|(_, session)| session).collect()
        };

        for session in cached {
            let Some(sid) = session.sid.as_deref() else {
                continue;
            };
            let result = match endpoint(&session.instance, &["auth"]) {
                Ok(url) => self
                    .send_with_retry(Method::DELETE, &url, Some(sid), None)
                    .await
                    .map_err(|e| e.into_appliance_error(&session.instance.name)),
                Err(e) => Err(e),
            };
            match result {
                Ok(_) => debug!(instance = %session.instance.name, "Pi-hole session closed"),
                Err(e) => warn!(
                    instance = %session.instance.name,
                    error = %e,
                    "Failed to close Pi-hole session"
                ),
            }
        }
    }

    fn cached_session(&self, name: &str) -> Option<Session> {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(name)
            .filter(|cached| cached.is_fresh())
            .map(|cached| Session::new(cached.instance.clone(), cached.sid.clone()))
    }

    fn forget_session(&self, name: &str) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    async fn login(&self, instance: &Instance) -> Result<Session, ApplianceError> {
        let url = endpoint(instance, &["auth"])?;
        let body = json!({ "password": instance.credential.expose() });

        let text = match self
            .send_with_retry(Method::POST, &url, None, Some(&body))
            .await
        {
            Ok(text) => text,
            Err(SendError::Status { status, body }) if status == StatusCode::UNAUTHORIZED => {
                let reason = serde_json::from_str::<AuthResponse>(&body)
                    .ok()
                    .and_then(|auth| auth.session.message)
                    .unwrap_or_else(|| "password rejected".to_string());
                return Err(ApplianceError::AuthenticationFailed {
                    instance: instance.name.clone(),
                    reason,
                });
            }
            Err(e) => return Err(e.into_appliance_error(&instance.name)),
        };

        let auth: AuthResponse = parse_json(&instance.name, &text)?;
        if !auth.session.valid {
            return Err(ApplianceError::AuthenticationFailed {
                instance: instance.name.clone(),
                reason: auth
                    .session
                    .message
                    .unwrap_or_else(|| "session not granted".to_string()),
            });
        }

        let renew_at = auth
            .session
            .validity
            .and_then(|secs| u64::try_from(secs).ok())
            .map(|secs| {
                Instant::now() + Duration::from_secs(secs.saturating_sub(SESSION_RENEWAL_MARGIN_SECS))
            });

        info!(
            instance = %instance.name,
            validity_secs = ?auth.session.validity,
            "Authenticated against Pi-hole"
        );

        let cached = CachedSession {
            instance: instance.clone(),
            sid: auth.session.sid,
            renew_at,
        };
        let session = Session::new(instance.clone(), cached.sid.clone());
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(instance.name.clone(), cached);

        Ok(session)
    }

    /// Renew a session the appliance rejected.
    ///
    /// Another call may already have renewed it, in which case the newer cached
    /// session is reused.
    async fn renew(&self, instance: &Instance, stale_sid: Option<&str>) -> Result<Session, ApplianceError> {
        if let Some(cached) = self.cached_session(&instance.name) {
            if cached.sid() != stale_sid {
                return Ok(cached);
            }
        }
        self.forget_session(&instance.name);
        self.login(instance).await
    }

    /// Execute an authenticated call, renewing the session once on 401.
    async fn call(
        &self,
        session: &Session,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<String, ApplianceError> {
        let instance = session.instance();
        match self
            .send_with_retry(method.clone(), &url, session.sid(), body)
            .await
        {
            Err(SendError::Status { status, .. })
                if status == StatusCode::UNAUTHORIZED && session.sid().is_some() =>
            {
                warn!(instance = %instance.name, "Pi-hole session rejected, re-authenticating");
                let renewed = self.renew(instance, session.sid()).await?;
                self.send_with_retry(method, &url, renewed.sid(), body)
                    .await
                    .map_err(|e| e.into_appliance_error(&instance.name))
            }
            other => other.map_err(|e| e.into_appliance_error(&instance.name)),
        }
    }

    /// Execute a request with automatic retry on transient failures.
    ///
    /// # Retry Behavior
    /// - Retries on HTTP 429, 500, 502, 503, 504 and connection failures
    /// - Fails immediately on other errors
    /// - Gives up once the [`RetryPolicy::PIHOLE_API`] budget is spent
    async fn send_with_retry(
        &self,
        method: Method,
        url: &Url,
        sid: Option<&str>,
        body: Option<&Value>,
    ) -> Result<String, SendError> {
        let mut backoff = RetryPolicy::PIHOLE_API.start();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let e = match self.send_once(method.clone(), url, sid, body).await {
                Ok(response) => {
                    if attempt > 1 {
                        debug!(
                            method = %method,
                            url = %url,
                            attempt = attempt,
                            elapsed = ?backoff.elapsed(),
                            "Pi-hole API call succeeded after retries"
                        );
                    }
                    return Ok(response);
                }
                Err(e) => e,
            };

            if !e.is_retryable() {
                debug!(
                    method = %method,
                    url = %url,
                    error = %e,
                    "Non-retryable Pi-hole API error, failing immediately"
                );
                return Err(e);
            }

            let Some(duration) = backoff.next_delay() else {
                error!(
                    method = %method,
                    url = %url,
                    attempt = attempt,
                    elapsed = ?backoff.elapsed(),
                    error = %e,
                    "Max retry time exceeded, giving up"
                );
                return Err(e);
            };

            warn!(
                method = %method,
                url = %url,
                attempt = attempt,
                retry_after = ?duration,
                error = %e,
                "Retryable Pi-hole API error, will retry"
            );
            tokio::time::sleep(duration).await;
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &Url,
        sid: Option<&str>,
        body: Option<&Value>,
    ) -> Result<String, SendError> {
        debug!(
            method = %method,
            url = %url,
            authenticated = sid.is_some(),
            "HTTP API request to Pi-hole"
        );

        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(sid) = sid {
            request = request.header(SESSION_HEADER, sid);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(SendError::Transport)?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            debug!(
                method = %method,
                url = %url,
                status = %status,
                "Pi-hole API request failed"
            );
            return Err(SendError::Status { status, body });
        }

        let text = response.text().await.map_err(SendError::Transport)?;
        debug!(
            method = %method,
            url = %url,
            status = %status,
            response_len = text.len(),
            "Pi-hole API request completed"
        );
        Ok(text)
    }
}

#[async_trait]
impl ApplianceClient for PiholeClient {
    async fn authenticate(&self, instance: &Instance) -> Result<Session, ApplianceError> {
        if let Some(session) = self.cached_session(&instance.name) {
            return Ok(session);
        }
        self.login(instance).await
    }

    async fn list_local_dns(&self, session: &Session) -> Result<Vec<DnsRecord>, ApplianceError> {
        let instance = session.instance();
        let url = endpoint(instance, &["config", "dns"])?;
        let text = self.call(session, Method::GET, url, None).await?;
        let response: ConfigResponse = parse_json(&instance.name, &text)?;

        let dns = response.config.dns;
        let a_records = parse_entries(&instance.name, RecordType::A, &dns.hosts);
        let cname_records = parse_entries(&instance.name, RecordType::Cname, &dns.cname_records);

        Ok(a_records.chain(cname_records).collect())
    }

    async fn add_record(&self, session: &Session, record: &DnsRecord) -> Result<(), ApplianceError> {
        let instance = session.instance();
        let url = record_endpoint(instance, record)?;
        self.call(session, Method::PUT, url, None).await?;

        info!(
            instance = %instance.name,
            record_type = %record.record_type,
            hostname = %record.hostname,
            target = %record.target,
            "Added local DNS record"
        );
        Ok(())
    }

    async fn delete_record(
        &self,
        session: &Session,
        record: &DnsRecord,
    ) -> Result<(), ApplianceError> {
        let instance = session.instance();
        let url = record_endpoint(instance, record)?;
        self.call(session, Method::DELETE, url, None).await?;

        info!(
            instance = %instance.name,
            record_type = %record.record_type,
            hostname = %record.hostname,
            target = %record.target,
            "Deleted local DNS record"
        );
        Ok(())
    }

    async fn queries(
        &self,
        session: &Session,
        params: &QueryParams,
    ) -> Result<Value, ApplianceError> {
        let instance = session.instance();
        let mut url = endpoint(instance, &["queries"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair(
                "length",
                &params.length.unwrap_or(DEFAULT_QUERY_LENGTH).to_string(),
            );
            if let Some(from) = params.from {
                query.append_pair("from", &from.to_string());
            }
            if let Some(until) = params.until {
                query.append_pair("until", &until.to_string());
            }
            for (key, value) in [
                ("upstream", &params.upstream),
                ("domain", &params.domain),
                ("client", &params.client),
                ("cursor", &params.cursor),
            ] {
                if let Some(value) = value {
                    query.append_pair(key, value);
                }
            }
        }

        let text = self.call(session, Method::GET, url, None).await?;
        parse_json(&instance.name, &text)
    }

    async fn query_history(&self, session: &Session) -> Result<Value, ApplianceError> {
        let instance = session.instance();
        let url = endpoint(instance, &["history"])?;
        let text = self.call(session, Method::GET, url, None).await?;
        parse_json(&instance.name, &text)
    }

    async fn query_suggestions(&self, session: &Session) -> Result<Value, ApplianceError> {
        let instance = session.instance();
        let url = endpoint(instance, &["queries", "suggestions"])?;
        let text = self.call(session, Method::GET, url, None).await?;
        parse_json(&instance.name, &text)
    }
}

/// Build `<base>/api/<segments...>`, percent-encoding each segment.
fn endpoint(instance: &Instance, segments: &[&str]) -> Result<Url, ApplianceError> {
    let mut url = instance.base_url.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| ApplianceError::InvalidResponse {
                instance: instance.name.clone(),
                reason: format!("base URL {} cannot carry a path", instance.base_url),
            })?;
        path.pop_if_empty().push("api").extend(segments);
    }
    Ok(url)
}

fn record_endpoint(instance: &Instance, record: &DnsRecord) -> Result<Url, ApplianceError> {
    let entry = record.appliance_entry();
    let mut segments: Vec<&str> = vec!["config"];
    segments.extend(record.record_type.config_path().split('/'));
    segments.push(&entry);
    endpoint(instance, &segments)
}

fn parse_entries<'a>(
    instance: &'a str,
    record_type: RecordType,
    entries: &'a [String],
) -> impl Iterator<Item = DnsRecord> + 'a {
    entries.iter().filter_map(move |entry| {
        let record = DnsRecord::parse_entry(record_type, entry);
        if record.is_none() {
            warn!(
                instance = %instance,
                record_type = %record_type,
                entry = %entry,
                "Skipping malformed local DNS entry"
            );
        }
        record
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(instance: &str, text: &str) -> Result<T, ApplianceError> {
    serde_json::from_str(text).map_err(|e| ApplianceError::InvalidResponse {
        instance: instance.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[path = "pihole_tests.rs"]
mod pihole_tests;
