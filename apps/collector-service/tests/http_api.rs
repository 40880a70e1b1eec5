//! End-to-end HTTP surface tests against an in-memory store, exercising the
//! decision ordering (P1), active-list filtering (I1), and the manual-add
//! conflict path without a network or a real upstream portal.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use blacklist_collector_service::{build_router, AppState, Config};
use blacklist_shared_heimdall::LogRingBuffer;
use serde_json::Value;
use tower::ServiceExt;

fn test_config(database_url: &str) -> Config {
    Config {
        credentials_master_key: "test-master-key".to_string(),
        encryption_salt: "blacklist-regtech-salt-2025".to_string(),
        database_url: database_url.to_string(),
        database_auth_token: None,
        port: 0,
        ingest_api_key: "test-ingest-key".to_string(),
        regtech_base_url: "https://regtech.example.test".to_string(),
        disable_auto_collection: true,
        collection_interval_seconds: 3600,
        batch_size: 2000,
        page_size: 100,
        max_pages_per_collection: 50,
    }
}

async fn test_app(name: &str) -> AppState {
    let config = test_config(&format!("file:{name}?mode=memory&cache=shared"));
    AppState::bootstrap(config, LogRingBuffer::new())
        .await
        .expect("in-memory app state bootstraps")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn unknown_ip_is_not_blocked() {
    let state = test_app("unknown_ip").await;
    let router = build_router(state);

    let request = Request::builder()
        .uri("/api/blacklist/check?ip=45.33.100.1")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["blocked"], false);
    assert_eq!(body["data"]["reason"], "not_in_blacklist");
}

#[tokio::test]
async fn whitelist_suppresses_blacklist_verdict() {
    let state = test_app("whitelist_override").await;

    state
        .blocked_ips
        .insert_manual(
            &blacklist_domain_models::NormalizedRecord {
                ip_address: "198.51.100.5".to_string(),
                source: "MANUAL".to_string(),
                country: None,
                reason: "malware".to_string(),
                confidence: 90,
                detection_date: chrono::Utc::now().date_naive(),
                removal_date: None,
                is_active: true,
                raw_payload: serde_json::json!({}),
            },
            "MANUAL",
        )
        .await
        .unwrap();
    state.whitelist.add("198.51.100.5", None, None, "MANUAL").await.unwrap();

    let router = build_router(state);
    let request = Request::builder()
        .uri("/api/blacklist/check?ip=198.51.100.5")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let body = body_json(response).await;

    assert_eq!(body["data"]["blocked"], false);
    assert_eq!(body["data"]["reason"], "whitelist");
}

#[tokio::test]
async fn expired_removal_date_is_not_blocked() {
    let state = test_app("expired_removal").await;

    state
        .blocked_ips
        .insert_manual(
            &blacklist_domain_models::NormalizedRecord {
                ip_address: "5.6.7.8".to_string(),
                source: "REGTECH".to_string(),
                country: None,
                reason: "malware".to_string(),
                confidence: 90,
                detection_date: chrono::NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                removal_date: Some(chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()),
                is_active: true,
                raw_payload: serde_json::json!({}),
            },
            "REGTECH",
        )
        .await
        .unwrap();

    let router = build_router(state);
    let request = Request::builder()
        .uri("/api/fortinet/blocklist?format=text")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(!text.contains("5.6.7.8"));
}

#[tokio::test]
async fn manual_add_rejects_private_address() {
    let state = test_app("private_rejection").await;
    let router = build_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/api/blacklist/manual-add")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "ip_address": "192.168.0.1" }).to_string(),
        ))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn manual_add_duplicate_returns_conflict() {
    let state = test_app("manual_duplicate").await;
    let router = build_router(state);

    let add = || {
        Request::builder()
            .method("POST")
            .uri("/api/blacklist/manual-add")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({ "ip_address": "45.33.32.10", "reason": "test" }).to_string(),
            ))
            .unwrap()
    };

    let first = router.clone().oneshot(add()).await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = router.oneshot(add()).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn ingest_rejects_missing_api_key() {
    let state = test_app("ingest_auth").await;
    let router = build_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/api/collection/ingest")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "service_name": "REGTECH", "items": [] }).to_string(),
        ))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ingest_counts_private_items_as_errors() {
    let state = test_app("ingest_private").await;
    let router = build_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/api/collection/ingest")
        .header("content-type", "application/json")
        .header("x-api-key", "test-ingest-key")
        .body(Body::from(
            serde_json::json!({
                "service_name": "REGTECH",
                "items": [{ "ip_address": "192.168.0.1" }],
            })
            .to_string(),
        ))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"]["stats"]["inserted"], 0);
    assert_eq!(body["data"]["stats"]["errors"], 1);
    assert_eq!(body["data"]["stats"]["total"], 1);
}

#[tokio::test]
async fn health_reports_status_ok() {
    let state = test_app("health_check").await;
    let router = build_router(state);

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}
