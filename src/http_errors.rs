// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP error mapping for Pi-hole API responses.
//!
//! This module converts HTTP status codes and transport failures returned while
//! talking to a Pi-hole instance into [`ApplianceError`] values, so every caller
//! reports upstream problems the same way.
//!
//! # Usage
//!
//! ```rust
//! use pihole_dns::http_errors::map_http_error;
//!
//! let err = map_http_error("primary", 503, "");
//! assert_eq!(err.reason(), "UpstreamUnavailable");
//!
//! let err = map_http_error("primary", 401, "password incorrect");
//! assert_eq!(err.reason(), "UpstreamAuthFailed");
//! ```

use crate::errors::ApplianceError;

/// Map an HTTP status code from a Pi-hole response to an [`ApplianceError`].
///
/// # HTTP Code Mapping
///
/// | HTTP Code | Error | Meaning |
/// |-----------|-------|---------|
/// | 401 | `AuthenticationFailed` | Session missing or expired |
/// | 403 | `AuthenticationFailed` | Insufficient permissions |
/// | 502, 503, 504 | `Unavailable` | Pi-hole or its proxy not answering |
/// | Other | `Rejected` | Request refused by the appliance |
///
/// `body` is the raw response body; Pi-hole wraps errors as
/// `{"error": {"key", "message", "hint"}}` and the message is extracted when present.
#[must_use]
pub fn map_http_error(instance: &str, status_code: u16, body: &str) -> ApplianceError {
    let detail = extract_error_message(body);
    match status_code {
        401 | 403 => ApplianceError::AuthenticationFailed {
            instance: instance.to_string(),
            reason: detail.unwrap_or_else(|| format!("Pi-hole refused the session ({status_code})")),
        },
        502..=504 => ApplianceError::Unavailable {
            instance: instance.to_string(),
            reason: detail.unwrap_or_else(|| format!("Pi-hole gateway error ({status_code})")),
        },
        _ => ApplianceError::Rejected {
            instance: instance.to_string(),
            status_code,
            reason: detail.unwrap_or_else(|| "no error message".to_string()),
        },
    }
}

/// Map a transport-level failure (no HTTP status received) to an [`ApplianceError`].
///
/// Use this when the HTTP client cannot establish a connection or the request
/// times out before a response arrives.
#[must_use]
pub fn map_connection_error(instance: &str, error: &reqwest::Error) -> ApplianceError {
    let reason = if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    };

    ApplianceError::Unavailable {
        instance: instance.to_string(),
        reason,
    }
}

/// Pull `error.message` (and `error.hint` when set) out of a Pi-hole error body.
fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    let message = error.get("message")?.as_str()?;

    match error.get("hint").and_then(serde_json::Value::as_str) {
        Some(hint) if !hint.is_empty() => Some(format!("{message} ({hint})")),
        _ => Some(message.to_string()),
    }
}

#[cfg(test)]
#[path = "http_errors_tests.rs"]
mod http_errors_tests;
