// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `pihole.rs`
//!
//! HTTP behavior against a mock appliance lives in `tests/pihole_integration.rs`.

#[cfg(test)]
mod tests {
    use super::super::{endpoint, record_endpoint, CachedSession, ConfigResponse, SendError};
    use crate::types::{Credential, DnsRecord, Instance};
    use reqwest::StatusCode;
    use std::time::{Duration, Instant};
    use url::Url;

    fn instance(url: &str) -> Instance {
        Instance::new("pihole", Url::parse(url).unwrap(), Credential::new("pw"))
    }

    #[test]
    fn test_endpoint_appends_api_prefix() {
        let url = endpoint(&instance("http://pi.hole"), &["config", "dns"]).unwrap();
        assert_eq!(url.as_str(), "http://pi.hole/api/config/dns");
    }

    #[test]
    fn test_endpoint_keeps_reverse_proxy_subpath() {
        let url = endpoint(&instance("https://proxy.lan/pihole"), &["auth"]).unwrap();
        assert_eq!(url.as_str(), "https://proxy.lan/pihole/api/auth");
    }

    #[test]
    fn test_a_record_endpoint_encodes_space() {
        let record = DnsRecord::a("nas.lan", "192.168.1.50");
        let url = record_endpoint(&instance("http://pi.hole"), &record).unwrap();
        assert_eq!(
            url.as_str(),
            "http://pi.hole/api/config/dns/hosts/192.168.1.50%20nas.lan"
        );
    }

    #[test]
    fn test_cname_record_endpoint_includes_ttl() {
        let record = DnsRecord::cname("media.lan", "nas.lan", Some(300));
        let url = record_endpoint(&instance("http://pi.hole"), &record).unwrap();
        assert_eq!(
            url.as_str(),
            "http://pi.hole/api/config/dns/cnameRecords/media.lan,nas.lan,300"
        );
    }

    #[test]
    fn test_entry_with_slash_stays_one_segment() {
        let record = DnsRecord::a("odd/name", "10.0.0.1");
        let url = record_endpoint(&instance("http://pi.hole"), &record).unwrap();
        assert!(url.path().ends_with("/hosts/10.0.0.1%20odd%2Fname"));
    }

    #[test]
    fn test_config_response_parses_both_arrays() {
        let body = r#"{
            "config": {
                "dns": {
                    "upstreams": ["1.1.1.1"],
                    "hosts": ["192.168.1.50 nas.lan"],
                    "cnameRecords": ["media.lan,nas.lan"]
                }
            },
            "took": 0.001
        }"#;
        let response: ConfigResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.config.dns.hosts, vec!["192.168.1.50 nas.lan"]);
        assert_eq!(response.config.dns.cname_records, vec!["media.lan,nas.lan"]);
    }

    #[test]
    fn test_config_response_missing_arrays_default_empty() {
        let response: ConfigResponse =
            serde_json::from_str(r#"{"config":{"dns":{}}}"#).unwrap();
        assert!(response.config.dns.hosts.is_empty());
        assert!(response.config.dns.cname_records.is_empty());
    }

    #[test]
    fn test_cached_session_freshness() {
        let base = CachedSession {
            instance: instance("http://pi.hole"),
            sid: Some("sid".to_string()),
            renew_at: None,
        };
        assert!(base.is_fresh(), "no expiry means always fresh");

        let expired = CachedSession {
            renew_at: Some(Instant::now()),
            ..base.clone()
        };
        std::thread::sleep(Duration::from_millis(2));
        assert!(!expired.is_fresh());

        let valid = CachedSession {
            renew_at: Some(Instant::now() + Duration::from_secs(60)),
            ..base
        };
        assert!(valid.is_fresh());
    }

    #[test]
    fn test_status_error_retryability() {
        let busy = SendError::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: String::new(),
        };
        let missing = SendError::Status {
            status: StatusCode::NOT_FOUND,
            body: String::new(),
        };
        assert!(busy.is_retryable());
        assert!(!missing.is_retryable());
    }

    #[test]
    fn test_status_error_is_attributed_to_instance() {
        let err = SendError::Status {
            status: StatusCode::BAD_REQUEST,
            body: r#"{"error":{"key":"bad_request","message":"Item already present","hint":null}}"#
                .to_string(),
        }
        .into_appliance_error("pihole2");

        assert_eq!(err.instance(), "pihole2");
        assert!(err.to_string().contains("Item already present"));
    }
}
