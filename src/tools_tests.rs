// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `tools.rs`

#[cfg(test)]
mod tests {
    use crate::discovery::TOOL_CATALOG;
    use crate::errors::{ApplianceError, ToolError};
    use crate::fanout::FanOutExecutor;
    use crate::test_support::{registry, FakeAppliance, ManualClock};
    use crate::tokens::ConfirmationStore;
    use crate::tools::{AddStatus, DnsTools, RemovalPreview, RemovalResponse, RemovalResult};
    use crate::types::{DnsRecord, RecordType};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    struct Harness {
        tools: DnsTools,
        fake: Arc<FakeAppliance>,
        clock: Arc<ManualClock>,
    }

    fn harness(names: &[&str]) -> Harness {
        let fake = Arc::new(FakeAppliance::new());
        let clock = Arc::new(ManualClock::new());
        let store = ConfirmationStore::with_clock(Duration::from_secs(600), clock.clone());
        let tools = DnsTools::with_parts(
            registry(names),
            fake.clone(),
            FanOutExecutor::new(Duration::from_secs(30)),
            Arc::new(store),
        );
        Harness { tools, fake, clock }
    }

    fn expect_preview(response: RemovalResponse) -> RemovalPreview {
        match response {
            RemovalResponse::Preview(preview) => preview,
            RemovalResponse::Deleted(_) => panic!("expected a preview"),
        }
    }

    fn expect_deleted(response: RemovalResponse) -> RemovalResult {
        match response {
            RemovalResponse::Deleted(result) => result,
            RemovalResponse::Preview(_) => panic!("expected a deletion"),
        }
    }

    // ========================================================================
    // Two-phase removal
    // ========================================================================

    #[tokio::test]
    async fn test_add_preview_confirm_then_list_shows_nothing() {
        let h = harness(&["A", "B"]);

        let added = h
            .tools
            .add_local_a_record("host.lan", "10.0.0.5", None)
            .await
            .unwrap();
        assert_eq!(added.len(), 2);
        assert!(added
            .iter()
            .all(|r| r.data().map(|d| d.status) == Some(AddStatus::Added)));

        let preview = expect_preview(
            h.tools
                .remove_local_a_record("host.lan", None, None)
                .await
                .unwrap(),
        );
        assert_eq!(preview.status, "pending_deletion");
        assert_eq!(preview.affected.len(), 2);
        assert_eq!(preview.affected[0].instance, "A");
        assert_eq!(preview.affected[1].instance, "B");
        for entry in &preview.affected {
            assert_eq!(entry.records, vec![DnsRecord::a("host.lan", "10.0.0.5")]);
        }
        assert!(h.fake.deletes().is_empty(), "preview must not mutate");

        let deleted = expect_deleted(
            h.tools
                .remove_local_a_record("host.lan", None, Some(&preview.token))
                .await
                .unwrap(),
        );
        assert_eq!(deleted.status, "deleted");
        assert_eq!(deleted.results.len(), 2);
        assert!(deleted.results.iter().all(|r| r.succeeded()));

        let listing = h.tools.list_local_dns(None).await.unwrap();
        for result in &listing {
            let data = result.data().unwrap();
            assert!(data.a_records.iter().all(|r| r.hostname != "host.lan"));
        }
    }

    #[tokio::test]
    async fn test_ghost_cname_yields_no_matching_records_and_no_entry() {
        let h = harness(&["A", "B"]);

        let err = h
            .tools
            .remove_local_cname_record("ghost.lan", None, None)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ToolError::NoMatchingRecords {
                record_type: RecordType::Cname,
                hostname: "ghost.lan".to_string(),
            }
        );
        assert!(h.tools.store().is_empty());
    }

    #[tokio::test]
    async fn test_second_preview_invalidates_first_token() {
        let h = harness(&["A"]);
        h.fake.seed("A", vec![DnsRecord::a("host.lan", "10.0.0.5")]);

        let first = expect_preview(
            h.tools
                .remove_local_a_record("host.lan", None, None)
                .await
                .unwrap(),
        );
        let _second = h
            .tools
            .remove_local_a_record("host.lan", None, None)
            .await
            .unwrap();

        let err = h
            .tools
            .remove_local_a_record("host.lan", None, Some(&first.token))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ToolError::TokenMismatch { .. } | ToolError::NoPendingDeletion { .. }
        ));
        assert!(h.fake.deletes().is_empty());
    }

    #[tokio::test]
    async fn test_empty_repreview_invalidates_first_token() {
        let h = harness(&["A"]);
        h.fake.seed("A", vec![DnsRecord::a("host.lan", "10.0.0.5")]);

        let first = expect_preview(
            h.tools
                .remove_local_a_record("host.lan", None, None)
                .await
                .unwrap(),
        );

        h.fake.seed("A", Vec::new());
        let err = h
            .tools
            .remove_local_a_record("host.lan", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "NoMatchingRecords");
        assert!(h.tools.store().is_empty());

        let err = h
            .tools
            .remove_local_a_record("host.lan", None, Some(&first.token))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ToolError::NoPendingDeletion {
                record_type: RecordType::A,
                hostname: "host.lan".to_string(),
            }
        );
        assert!(h.fake.deletes().is_empty());
    }

    #[tokio::test]
    async fn test_failed_repreview_invalidates_first_token() {
        let h = harness(&["A"]);
        h.fake.seed("A", vec![DnsRecord::cname("app.lan", "nas.lan", None)]);

        let first = expect_preview(
            h.tools
                .remove_local_cname_record("app.lan", None, None)
                .await
                .unwrap(),
        );

        h.fake.set_unreachable("A", true);
        let err = h
            .tools
            .remove_local_cname_record("app.lan", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "LookupFailed");

        h.fake.set_unreachable("A", false);
        let err = h
            .tools
            .remove_local_cname_record("app.lan", None, Some(&first.token))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "NoPendingDeletion");
        assert!(h.fake.deletes().is_empty());
    }

    #[tokio::test]
    async fn test_token_confirms_only_once() {
        let h = harness(&["A"]);
        h.fake.seed("A", vec![DnsRecord::a("host.lan", "10.0.0.5")]);

        let preview = expect_preview(
            h.tools
                .remove_local_a_record("host.lan", None, None)
                .await
                .unwrap(),
        );
        h.tools
            .remove_local_a_record("host.lan", None, Some(&preview.token))
            .await
            .unwrap();

        let err = h
            .tools
            .remove_local_a_record("host.lan", None, Some(&preview.token))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "NoPendingDeletion");
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let h = harness(&["A"]);
        h.fake.seed("A", vec![DnsRecord::a("host.lan", "10.0.0.5")]);

        let preview = expect_preview(
            h.tools
                .remove_local_a_record("host.lan", None, None)
                .await
                .unwrap(),
        );
        h.clock.advance(Duration::from_secs(601));

        let err = h
            .tools
            .remove_local_a_record("host.lan", None, Some(&preview.token))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "NoPendingDeletion");
        assert_eq!(h.fake.records("A").len(), 1, "nothing deleted");
    }

    #[tokio::test]
    async fn test_confirm_deletes_only_captured_records() {
        let h = harness(&["A"]);
        h.fake.seed("A", vec![DnsRecord::a("host.lan", "10.0.0.5")]);

        let preview = expect_preview(
            h.tools
                .remove_local_a_record("host.lan", None, None)
                .await
                .unwrap(),
        );

        // Appears after the preview, so it is not part of the confirmed deletion
        h.tools
            .add_local_a_record("host.lan", "10.0.0.9", None)
            .await
            .unwrap();

        h.tools
            .remove_local_a_record("host.lan", None, Some(&preview.token))
            .await
            .unwrap();

        assert_eq!(h.fake.records("A"), vec![DnsRecord::a("host.lan", "10.0.0.9")]);
    }

    #[tokio::test]
    async fn test_confirm_targets_previewed_instances_regardless_of_instance_arg() {
        let h = harness(&["A", "B"]);
        h.fake.seed("A", vec![DnsRecord::a("host.lan", "10.0.0.5")]);
        h.fake.seed("B", vec![DnsRecord::a("host.lan", "10.0.0.5")]);

        let preview = expect_preview(
            h.tools
                .remove_local_a_record("host.lan", None, None)
                .await
                .unwrap(),
        );
        let deleted = expect_deleted(
            h.tools
                .remove_local_a_record("host.lan", Some("B"), Some(&preview.token))
                .await
                .unwrap(),
        );

        let instances: Vec<&str> = deleted.results.iter().map(|r| r.instance.as_str()).collect();
        assert_eq!(instances, vec!["A", "B"]);
        assert!(h.fake.records("A").is_empty());
        assert!(h.fake.records("B").is_empty());
    }

    #[tokio::test]
    async fn test_preview_reports_unreachable_instances() {
        let h = harness(&["A", "B"]);
        h.fake.seed("A", vec![DnsRecord::a("host.lan", "10.0.0.5")]);
        h.fake.set_unreachable("B", true);

        let preview = expect_preview(
            h.tools
                .remove_local_a_record("host.lan", None, None)
                .await
                .unwrap(),
        );

        assert_eq!(preview.affected.len(), 1);
        assert_eq!(preview.failures.len(), 1);
        assert_eq!(preview.failures[0].instance, "B");
        assert_eq!(preview.failures[0].reason, "UpstreamUnavailable");
        assert!(preview.message.contains("B"));
    }

    #[tokio::test]
    async fn test_no_matches_with_failed_lookup_is_lookup_failed() {
        let h = harness(&["A", "B"]);
        h.fake.set_unreachable("B", true);

        let err = h
            .tools
            .remove_local_a_record("host.lan", None, None)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ToolError::LookupFailed {
                record_type: RecordType::A,
                hostname: "host.lan".to_string(),
                instances: vec!["B".to_string()],
            }
        );
        assert!(h.tools.store().is_empty());
    }

    #[tokio::test]
    async fn test_partial_confirm_failure_is_isolated() {
        let h = harness(&["A", "B"]);
        h.fake.seed("A", vec![DnsRecord::a("host.lan", "10.0.0.5")]);
        h.fake.seed("B", vec![DnsRecord::a("host.lan", "10.0.0.5")]);

        let preview = expect_preview(
            h.tools
                .remove_local_a_record("host.lan", None, None)
                .await
                .unwrap(),
        );
        h.fake.set_unreachable("A", true);

        let deleted = expect_deleted(
            h.tools
                .remove_local_a_record("host.lan", None, Some(&preview.token))
                .await
                .unwrap(),
        );

        assert!(!deleted.results[0].succeeded());
        assert!(deleted.results[1].succeeded());
        assert!(deleted.message.contains("1 instance(s) failed"));
    }

    // ========================================================================
    // Fan-out behavior through the tools
    // ========================================================================

    #[tokio::test]
    async fn test_failing_middle_instance_is_isolated() {
        let h = harness(&["one", "two", "three"]);
        h.fake.set_unreachable("two", true);

        let results = h.tools.list_local_dns(None).await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(results[0].succeeded());
        assert!(!results[1].succeeded());
        assert!(results[2].succeeded());
    }

    #[tokio::test]
    async fn test_panicking_instance_is_isolated() {
        let h = harness(&["one", "two", "three"]);
        h.fake.panic_on("two");

        let results = h.tools.list_local_dns(None).await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(results[0].succeeded());
        assert!(matches!(
            results[1].error(),
            Some(ApplianceError::TaskFailed { .. })
        ));
        assert!(results[2].succeeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_in_registry_order_with_delayed_instances() {
        let h = harness(&["first", "second", "third"]);
        h.fake.delay("first", Duration::from_millis(300));
        h.fake.delay("second", Duration::from_millis(10));
        h.fake.delay("third", Duration::from_millis(150));

        let results = h.tools.list_local_dns(None).await.unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.instance.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_list_splits_record_types() {
        let h = harness(&["A"]);
        h.fake.seed(
            "A",
            vec![
                DnsRecord::a("nas.lan", "192.168.1.50"),
                DnsRecord::cname("media.lan", "nas.lan", None),
            ],
        );

        let results = h.tools.list_local_dns(Some("A")).await.unwrap();
        let data = results[0].data().unwrap();
        assert_eq!(data.a_records.len(), 1);
        assert_eq!(data.cname_records.len(), 1);
    }

    // ========================================================================
    // Adds and validation
    // ========================================================================

    #[tokio::test]
    async fn test_add_existing_record_reports_exists() {
        let h = harness(&["A"]);
        h.fake.seed("A", vec![DnsRecord::a("nas.lan", "192.168.1.50")]);

        let results = h
            .tools
            .add_local_a_record("nas.lan", "192.168.1.50", None)
            .await
            .unwrap();

        let outcome = results[0].data().unwrap();
        assert_eq!(outcome.status, AddStatus::Exists);
        assert_eq!(outcome.record, "192.168.1.50 nas.lan");
        assert_eq!(h.fake.records("A").len(), 1);
    }

    #[tokio::test]
    async fn test_add_cname_uses_default_ttl() {
        let h = harness(&["A"]);

        let results = h
            .tools
            .add_local_cname_record("media.lan", "nas.lan", None, None)
            .await
            .unwrap();

        assert_eq!(results[0].data().unwrap().record, "media.lan,nas.lan,300");
        assert_eq!(
            h.fake.records("A"),
            vec![DnsRecord::cname("media.lan", "nas.lan", Some(300))]
        );
    }

    #[tokio::test]
    async fn test_add_cname_with_different_ttl_is_added() {
        let h = harness(&["A"]);
        h.fake.seed("A", vec![DnsRecord::cname("media.lan", "nas.lan", Some(300))]);

        let results = h
            .tools
            .add_local_cname_record("media.lan", "nas.lan", Some(600), None)
            .await
            .unwrap();
        assert_eq!(results[0].data().unwrap().status, AddStatus::Added);
        assert_eq!(results[0].data().unwrap().record, "media.lan,nas.lan,600");

        let results = h
            .tools
            .add_local_cname_record("media.lan", "nas.lan", Some(300), None)
            .await
            .unwrap();
        assert_eq!(results[0].data().unwrap().status, AddStatus::Exists);
    }

    #[tokio::test]
    async fn test_add_to_single_instance() {
        let h = harness(&["A", "B"]);

        let results = h
            .tools
            .add_local_a_record("nas.lan", "192.168.1.50", Some("B"))
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].instance, "B");
        assert!(h.fake.records("A").is_empty());
    }

    #[tokio::test]
    async fn test_invalid_ip_rejected_before_fan_out() {
        let h = harness(&["A"]);

        let err = h
            .tools
            .add_local_a_record("nas.lan", "999.1.1.1", None)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "InvalidArgument");
        assert!(h.fake.records("A").is_empty());
    }

    #[tokio::test]
    async fn test_hostname_validation() {
        let h = harness(&["A"]);

        for bad in ["", "   ", "two words.lan", "a,b.lan"] {
            let err = h
                .tools
                .remove_local_a_record(bad, None, None)
                .await
                .unwrap_err();
            assert_eq!(err.reason(), "InvalidArgument", "hostname {bad:?}");
        }
    }

    #[tokio::test]
    async fn test_hostname_is_trimmed() {
        let h = harness(&["A"]);
        h.fake.seed("A", vec![DnsRecord::a("host.lan", "10.0.0.5")]);

        let preview = expect_preview(
            h.tools
                .remove_local_a_record("  host.lan ", None, None)
                .await
                .unwrap(),
        );
        assert_eq!(preview.hostname, "host.lan");
    }

    #[tokio::test]
    async fn test_unknown_instance() {
        let h = harness(&["A", "B"]);

        let err = h.tools.list_local_dns(Some("C")).await.unwrap_err();
        assert_eq!(
            err,
            ToolError::UnknownInstance {
                name: "C".to_string(),
                available: vec!["A".to_string(), "B".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_empty_token_rejected() {
        let h = harness(&["A"]);
        let err = h
            .tools
            .remove_local_a_record("host.lan", None, Some(""))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "InvalidArgument");
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    #[tokio::test]
    async fn test_call_dispatches_by_name() {
        let h = harness(&["A"]);
        h.fake.seed("A", vec![DnsRecord::a("host.lan", "10.0.0.5")]);

        let preview = h
            .tools
            .call("remove_local_a_record", json!({ "hostname": "host.lan" }))
            .await
            .unwrap();
        assert_eq!(preview["status"], "pending_deletion");
        let token = preview["token"].as_str().unwrap().to_string();

        let deleted = h
            .tools
            .call(
                "remove_local_a_record",
                json!({ "hostname": "host.lan", "token": token }),
            )
            .await
            .unwrap();
        assert_eq!(deleted["status"], "deleted");
        assert_eq!(deleted["results"][0]["succeeded"], true);
    }

    #[tokio::test]
    async fn test_call_accepts_null_arguments() {
        let h = harness(&["A"]);
        let result = h.tools.call("list_local_dns", serde_json::Value::Null).await.unwrap();
        assert_eq!(result[0]["instance"], "A");
    }

    #[tokio::test]
    async fn test_call_unknown_tool() {
        let h = harness(&["A"]);
        let err = h.tools.call("flush_cache", json!({})).await.unwrap_err();
        assert_eq!(err.reason(), "UnknownTool");
    }

    #[tokio::test]
    async fn test_call_reaches_every_catalog_tool() {
        let h = harness(&["A"]);

        for tool in TOOL_CATALOG {
            let result = h.tools.call(tool.name, json!({ "hostname": "x.lan" })).await;
            assert!(
                !matches!(result, Err(ToolError::UnknownTool { .. })),
                "{} is catalogued but not dispatched",
                tool.name
            );
        }
    }

    #[tokio::test]
    async fn test_call_malformed_arguments() {
        let h = harness(&["A"]);

        let missing = h
            .tools
            .call("add_local_a_record", json!({ "hostname": "nas.lan" }))
            .await
            .unwrap_err();
        assert_eq!(missing.reason(), "MalformedArguments");

        let unknown_field = h
            .tools
            .call("list_local_dns", json!({ "instanse": "A" }))
            .await
            .unwrap_err();
        assert_eq!(unknown_field.reason(), "MalformedArguments");
    }

    #[tokio::test]
    async fn test_call_list_queries_forwards_filters() {
        let h = harness(&["A"]);

        let result = h
            .tools
            .call("list_queries", json!({ "length": 25, "domain": "*.lan" }))
            .await
            .unwrap();
        assert_eq!(result[0]["data"]["length"], 25);
        assert_eq!(result[0]["data"]["domain"], "*.lan");
    }

    #[tokio::test]
    async fn test_metrics_tools_fan_out() {
        let h = harness(&["A", "B"]);
        h.fake.set_unreachable("B", true);

        let history = h.tools.list_query_history(None).await.unwrap();
        assert!(history[0].succeeded());
        assert!(!history[1].succeeded());

        let suggestions = h.tools.list_query_suggestions(Some("A")).await.unwrap();
        assert_eq!(suggestions.len(), 1);
    }
}
