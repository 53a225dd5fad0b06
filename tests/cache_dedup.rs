//! Request de-duplication and caching through the client.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dialdesk::api::types::LeadUpdate;
use dialdesk::api::LeadsApi;
use dialdesk::{ApiError, RequestOptions};
use futures_util::future::join_all;
use serde_json::Value;

mod common;

#[tokio::test]
async fn test_concurrent_identical_gets_share_one_request() {
    let backend = common::start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        (200, r#"{"items": [], "total": 0}"#.to_string())
    })
    .await;
    let client = common::client_for(&backend);

    let opts = RequestOptions::new().query("page", 1);
    let results: Vec<Result<Value, ApiError>> =
        join_all((0..10).map(|_| client.get_cached("/api/leads", &opts))).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(backend.hits(), 1);

    // Fresh entry served from cache.
    let _: Value = client.get_cached("/api/leads", &opts).await.unwrap();
    assert_eq!(backend.hits(), 1);

    // Different query, different key.
    let _: Value = client
        .get_cached("/api/leads", &RequestOptions::new().query("page", 2))
        .await
        .unwrap();
    assert_eq!(backend.hits(), 2);
}

#[tokio::test]
async fn test_failures_are_shared_but_not_cached() {
    let count = Arc::new(AtomicU32::new(0));
    let cc = count.clone();
    let backend = common::start_programmable_backend(move |_| {
        let cc = cc.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if cc.fetch_add(1, Ordering::SeqCst) == 0 {
                (404, r#"{"detail": "Not found"}"#.to_string())
            } else {
                (200, r#"{"id": "1"}"#.to_string())
            }
        }
    })
    .await;
    let client = common::client_for(&backend);

    let opts = RequestOptions::new();
    let results: Vec<Result<Value, ApiError>> =
        join_all((0..5).map(|_| client.get_cached("/api/leads/1", &opts))).await;
    assert!(results
        .iter()
        .all(|r| matches!(r, Err(ApiError::ClientError { status: 404, .. }))));
    assert_eq!(backend.hits(), 1);

    let value: Value = client.get_cached("/api/leads/1", &opts).await.unwrap();
    assert_eq!(value["id"], "1");
    assert_eq!(backend.hits(), 2);
}

#[tokio::test]
async fn test_expired_entries_refetch() {
    let backend = common::start_mock_backend(200, r#"{"ok": true}"#).await;
    let client = common::client_for(&backend);
    let opts = RequestOptions::new().cache_ttl(Duration::from_millis(100));

    let _: Value = client.get_cached("/api/calls", &opts).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    let _: Value = client.get_cached("/api/calls", &opts).await.unwrap();
    assert_eq!(backend.hits(), 2);
}

#[tokio::test]
async fn test_clear_cache_forces_refetch() {
    let backend = common::start_mock_backend(200, r#"{"ok": true}"#).await;
    let client = common::client_for(&backend);

    let _: Value = client.get_cached("/api/calls", &RequestOptions::new()).await.unwrap();
    client.clear_cache();
    let _: Value = client.get_cached("/api/calls", &RequestOptions::new()).await.unwrap();
    assert_eq!(backend.hits(), 2);
}

#[tokio::test]
async fn test_optimistic_lead_update_rolls_back() {
    let backend = common::start_programmable_backend(|req| async move {
        match req.method.as_str() {
            "GET" => (
                200,
                r#"{"id": "7", "name": "Ada", "phone_number": "+15550100", "status": "new"}"#.to_string(),
            ),
            _ => (422, r#"{"detail": "Status transition not allowed"}"#.to_string()),
        }
    })
    .await;
    let client = common::client_for(&backend);
    let leads = LeadsApi::new(client.clone());

    let lead = leads.get("7").await.unwrap();
    assert_eq!(lead.status.as_deref(), Some("new"));

    let update = LeadUpdate {
        status: Some("won".into()),
        ..Default::default()
    };
    let err = leads.update("7", &update).await.unwrap_err();
    assert_eq!(err.user_message(), "Status transition not allowed");

    let cached = leads.get("7").await.unwrap();
    assert_eq!(cached.status.as_deref(), Some("new"));
    // Detail served from cache both times.
    assert_eq!(backend.requests().iter().filter(|r| r.method == "GET").count(), 1);
}

#[tokio::test]
async fn test_lead_update_success_refreshes_cache() {
    let backend = common::start_programmable_backend(|req| async move {
        match req.method.as_str() {
            "GET" if req.path_only() == "/api/leads" => (
                200,
                r#"{"items": [{"id": "7", "name": "Ada", "phone_number": "+15550100"}], "total": 1}"#.to_string(),
            ),
            "GET" => (
                200,
                r#"{"id": "7", "name": "Ada", "phone_number": "+15550100", "status": "new"}"#.to_string(),
            ),
            _ => (
                200,
                r#"{"id": "7", "name": "Ada", "phone_number": "+15550100", "status": "qualified"}"#.to_string(),
            ),
        }
    })
    .await;
    let client = common::client_for(&backend);
    let leads = LeadsApi::new(client.clone());

    leads.list(1, 50).await.unwrap();
    leads.get("7").await.unwrap();

    let update = LeadUpdate {
        status: Some("qualified".into()),
        ..Default::default()
    };
    let updated = leads.update("7", &update).await.unwrap();
    assert_eq!(updated.status.as_deref(), Some("qualified"));

    let patch = backend
        .requests()
        .into_iter()
        .find(|r| r.method == "PATCH")
        .unwrap();
    assert_eq!(patch.path, "/api/leads/7");
    assert_eq!(patch.body, br#"{"status":"qualified"}"#);

    // Detail comes from the refreshed cache; the list was invalidated.
    assert_eq!(leads.get("7").await.unwrap().status.as_deref(), Some("qualified"));
    leads.list(1, 50).await.unwrap();
    let list_gets = backend
        .requests()
        .iter()
        .filter(|r| r.method == "GET" && r.path_only() == "/api/leads")
        .count();
    assert_eq!(list_gets, 2);
}
