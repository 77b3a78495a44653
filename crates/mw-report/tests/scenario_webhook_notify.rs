use std::time::Duration;

use httpmock::prelude::*;
use mw_reconcile::{MirrorScope, ProblemReport, ReconcileReport, VerdictTally};
use mw_report::{notify, summarize, WebhookNotifier};

fn report(mirror: &str, problems: &[(&str, &str)]) -> ReconcileReport {
    let mut p = ProblemReport::new();
    for (project, line) in problems {
        p.record(project, line);
    }
    ReconcileReport {
        mirror: mirror.to_string(),
        scope: MirrorScope::Public,
        problems: p,
        tally: VerdictTally::default(),
    }
}

#[test]
fn summary_groups_by_mirror_and_skips_clean_ones() {
    let reports = [
        report("Github", &[("dde", "project not found")]),
        report("Gitlab", &[]),
    ];
    assert_eq!(
        summarize(&reports),
        "-- **Github** --\ndde: project not found\n"
    );
}

#[tokio::test]
async fn summary_is_posted_as_payload_param() {
    let server = MockServer::start_async().await;
    let expected = serde_json::json!({"text": "-- **Github** --\ndde: project not found\n"})
        .to_string();
    let hook = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/hook/abc")
                .query_param("payload", expected.as_str());
            then.status(200).json_body(serde_json::json!({"code": 0}));
        })
        .await;

    let sink = WebhookNotifier::new(server.url("/hook/abc"), Duration::from_secs(5)).unwrap();
    let sent = notify(&sink, &[report("Github", &[("dde", "project not found")])]).await;

    assert!(sent);
    hook.assert_hits_async(1).await;
}

#[tokio::test]
async fn nothing_is_sent_when_all_mirrors_are_clean() {
    let server = MockServer::start_async().await;
    let hook = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200);
        })
        .await;

    let sink = WebhookNotifier::new(server.url("/hook"), Duration::from_secs(5)).unwrap();
    assert!(!notify(&sink, &[report("Github", &[])]).await);
    hook.assert_hits_async(0).await;
}

#[tokio::test]
async fn delivery_failure_is_swallowed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(500);
        })
        .await;

    let sink = WebhookNotifier::new(server.url("/hook"), Duration::from_secs(5)).unwrap();
    assert!(!notify(&sink, &[report("Github", &[("a", "project not found")])]).await);
}
