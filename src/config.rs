// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Instance configuration loading.
//!
//! Up to four Pi-hole instances are configured through environment slots:
//!
//! | Slot | URL | Password | Name (optional) |
//! |------|-----|----------|-----------------|
//! | 1 | `PIHOLE_URL` | `PIHOLE_PASSWORD` | `PIHOLE_NAME` |
//! | 2 | `PIHOLE2_URL` | `PIHOLE2_PASSWORD` | `PIHOLE2_NAME` |
//! | 3 | `PIHOLE3_URL` | `PIHOLE3_PASSWORD` | `PIHOLE3_NAME` |
//! | 4 | `PIHOLE4_URL` | `PIHOLE4_PASSWORD` | `PIHOLE4_NAME` |
//!
//! A slot is used when both URL and password are set. Setting only one of the two
//! is treated as a mistake and fails startup, as does configuring no slot at all.

use crate::constants::{
    ENV_NAME_SUFFIX, ENV_PASSWORD_SUFFIX, ENV_URL_SUFFIX, INSTANCE_ENV_PREFIXES,
};
use crate::errors::ConfigError;
use crate::types::{Credential, Instance};
use tracing::{debug, info};
use url::Url;

/// Load instances from the process environment.
///
/// # Errors
///
/// Returns a [`ConfigError`] if no slot is complete, a slot is half-configured,
/// a URL is invalid, or two slots share a name.
pub fn load_instances_from_env() -> Result<Vec<Instance>, ConfigError> {
    load_instances(|key| std::env::var(key).ok())
}

/// Load instances through an arbitrary variable lookup.
///
/// Blank values are treated as unset. Instances are returned in slot order.
///
/// # Errors
///
/// Same conditions as [`load_instances_from_env`].
pub fn load_instances<F>(lookup: F) -> Result<Vec<Instance>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: String| {
        lookup(&key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let mut instances: Vec<Instance> = Vec::new();

    for prefix in INSTANCE_ENV_PREFIXES {
        let url_key = format!("{prefix}{ENV_URL_SUFFIX}");
        let password_key = format!("{prefix}{ENV_PASSWORD_SUFFIX}");

        let (raw_url, password) = match (get(url_key.clone()), get(password_key.clone())) {
            (Some(url), Some(password)) => (url, password),
            (None, None) => {
                debug!(prefix, "Pi-hole slot not configured");
                continue;
            }
            (Some(_), None) => {
                return Err(ConfigError::IncompleteInstance {
                    prefix: prefix.to_string(),
                    missing: password_key,
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::IncompleteInstance {
                    prefix: prefix.to_string(),
                    missing: url_key,
                })
            }
        };

        let base_url = normalize_base_url(&raw_url).map_err(|reason| ConfigError::InvalidUrl {
            prefix: prefix.to_string(),
            url: raw_url.clone(),
            reason,
        })?;

        let name = get(format!("{prefix}{ENV_NAME_SUFFIX}"))
            .unwrap_or_else(|| prefix.to_lowercase());

        if instances.iter().any(|existing| existing.name == name) {
            return Err(ConfigError::DuplicateInstanceName { name });
        }

        info!(instance = %name, url = %base_url, "Configured Pi-hole instance");
        instances.push(Instance::new(name, base_url, Credential::new(password)));
    }

    if instances.is_empty() {
        return Err(ConfigError::NoInstancesConfigured);
    }

    Ok(instances)
}

/// Normalize a configured Pi-hole URL to the web server root.
///
/// Accepts `http://pi.hole`, `http://pi.hole/`, `http://pi.hole/admin` or
/// `http://pi.hole/api` and returns the URL without trailing slash or API/admin suffix.
///
/// # Errors
///
/// Returns a human-readable reason if the URL cannot be parsed, has no host, or
/// does not use the `http`/`https` scheme.
pub fn normalize_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw).map_err(|e| e.to_string())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() || url.cannot_be_a_base() {
        return Err("URL has no host".to_string());
    }

    let mut path = url.path().trim_end_matches('/').to_string();
    for suffix in ["/api", "/admin"] {
        if let Some(stripped) = path.strip_suffix(suffix) {
            path = stripped.trim_end_matches('/').to_string();
        }
    }
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
