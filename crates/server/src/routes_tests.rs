// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use cortex_approval::{ApprovalService, NewRequest};
use cortex_backend::fake::FakeBackend;
use cortex_backend::Registry;
use cortex_core::{JobId, RiskLevel, SystemClock};
use cortex_queue::MemQueue;
use cortex_sse::SseManager;
use cortex_storage::MemStore;
use tower::ServiceExt;

use super::*;

fn harness() -> AppState {
    let store = Arc::new(MemStore::new());
    let queue = Arc::new(MemQueue::new());
    let fake = Arc::new(FakeBackend::new("fake", vec![]));
    let registry = Arc::new(Registry::builder().register("fake", fake, 2, 3, Duration::from_secs(30)).build());
    let sse = Arc::new(SseManager::new());
    let approvals = Arc::new(ApprovalService::new(store.clone(), queue, SystemClock));
    AppState { store, registry, sse, approvals, start_time: std::time::Instant::now() }
}

#[tokio::test]
async fn health_reports_ok() {
    let app = router(harness());
    let res = app.oneshot(Request::get("/v1/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let parsed: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.status, "ok");
}

#[tokio::test]
async fn health_backends_reports_registered_backend() {
    let app = router(harness());
    let res = app.oneshot(Request::get("/v1/health/backends").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let parsed: Vec<BackendHealthEntry> = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].name, "fake");
}

#[tokio::test]
async fn decide_by_id_approves_a_pending_request() {
    let state = harness();
    let created = state
        .approvals
        .create_request(NewRequest {
            job_id: JobId::new(),
            action_type: "send_email".into(),
            action_summary: "send a reminder".into(),
            action_detail: serde_json::json!({}),
            risk_level: RiskLevel::P1,
            resume_payload: None,
            blast_radius: None,
            notification_channels: serde_json::json!([]),
            approver_user_account_id: None,
            ttl_override: None,
        })
        .await
        .unwrap();

    let app = router(state);
    let body = serde_json::json!({"approve": true, "decided_by": "alice", "decision_note": null});
    let request = Request::post(format!("/v1/approvals/{}/decide", created.request.id.0))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let res = app.oneshot(request).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let response_body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let decided: cortex_core::ApprovalRequest = serde_json::from_slice(&response_body).unwrap();
    assert_eq!(decided.status, cortex_core::ApprovalStatus::Approved);
}

#[tokio::test]
async fn decide_by_id_unknown_id_returns_404() {
    let app = router(harness());
    let body = serde_json::json!({"approve": true, "decided_by": "alice", "decision_note": null});
    let request = Request::post(format!("/v1/approvals/{}/decide", uuid::Uuid::new_v4()))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let res = app.oneshot(request).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn channel_events_stream_opens_with_sse_content_type() {
    let app = router(harness());
    let res = app.oneshot(Request::get("/v1/channels/demo/events").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let content_type = res.headers().get("content-type").unwrap().to_str().unwrap();
    assert_eq!(content_type, "text/event-stream");
}
