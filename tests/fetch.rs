//! Bronze fetch across several resources

mod common;

use chrono::{TimeZone, Utc};
use common::{MockTransport, executor};
use payday_cli::api::{HttpResponse, PageOptions};
use payday_cli::cli::commands::fetch::fetch_resources;
use payday_cli::config::Config;
use serde_json::json;
use std::fs;
use std::sync::Arc;

fn options() -> PageOptions {
    PageOptions {
        per_page: 10,
        max_pages: 5,
    }
}

fn resources(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[tokio::test]
async fn test_unwritable_resource_does_not_stop_the_rest() {
    let transport = Arc::new(MockTransport::new());
    transport.push(Ok(HttpResponse::json(200, &json!([{"id": 1}]))));
    transport.push(Ok(HttpResponse::json(200, &json!([{"id": 2}, {"id": 3}]))));
    let executor = executor(&transport);

    let root = tempfile::tempdir().unwrap();
    // A plain file where the customers directory should go
    fs::create_dir_all(root.path().join("payday")).unwrap();
    fs::write(root.path().join("payday").join("customers"), "").unwrap();
    let at = Utc.with_ymd_and_hms(2024, 5, 2, 6, 0, 0).unwrap();

    let failures = fetch_resources(
        &executor,
        &Config::default(),
        &resources(&["customers", "invoices"]),
        &[],
        options(),
        root.path(),
        at,
    )
    .await;

    assert_eq!(failures, 1);
    let snapshot = root
        .path()
        .join("payday")
        .join("invoices")
        .join("snapshot_20240502_060000.jsonl");
    let content = fs::read_to_string(snapshot).unwrap();
    assert_eq!(content.lines().count(), 2);
    assert_eq!(transport.api_requests().len(), 2);
}

#[tokio::test]
async fn test_failed_resource_is_counted() {
    let transport = Arc::new(MockTransport::new());
    transport.push_status(404, "");
    transport.push(Ok(HttpResponse::json(200, &json!([{"id": 7}]))));
    let executor = executor(&transport);
    let root = tempfile::tempdir().unwrap();
    let at = Utc.with_ymd_and_hms(2024, 5, 2, 6, 0, 0).unwrap();

    let failures = fetch_resources(
        &executor,
        &Config::default(),
        &resources(&["missing", "customers"]),
        &[],
        options(),
        root.path(),
        at,
    )
    .await;

    assert_eq!(failures, 1);
    assert!(!root.path().join("payday").join("missing").exists());
    assert!(root.path().join("payday").join("customers").is_dir());
}

#[tokio::test]
async fn test_query_and_resource_paths_are_forwarded() {
    let transport = Arc::new(MockTransport::new());
    transport.push(Ok(HttpResponse::json(200, &json!([{"amount": 100}]))));
    let executor = executor(&transport);
    let root = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.resources.insert(
        "account-statement".to_string(),
        "/accounting/account-statement".to_string(),
    );
    let query = vec![("dateFrom".to_string(), "2024-01-01".to_string())];

    let failures = fetch_resources(
        &executor,
        &config,
        &resources(&["account-statement"]),
        &query,
        options(),
        root.path(),
        Utc::now(),
    )
    .await;

    assert_eq!(failures, 0);
    let requests = transport.api_requests();
    assert_eq!(requests[0].url, "https://api.test/accounting/account-statement");
    assert!(requests[0].query.contains(&("dateFrom".to_string(), "2024-01-01".to_string())));
}
