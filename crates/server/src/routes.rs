// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The thin HTTP/SSE surface: five routes, each a few lines of extraction
//! and a direct call into the owning service crate. Request/response DTOs
//! are grouped above their handlers the way `adamtc007-ob-poc`'s
//! `*_routes.rs` files separate "Request/Response Types" from "Route
//! Handlers".

use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::sse::Sse;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use cortex_core::ApprovalRequestId;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/channels/:channel/events", get(subscribe_channel))
        .route("/v1/approvals/:id/decide", post(decide_by_id))
        .route("/v1/approvals/by-token/:token/decide", post(decide_by_token))
        .route("/v1/health/backends", get(health_backends))
        .route("/v1/health", get(health))
        .with_state(state)
}

// ==== Request/Response Types ====

#[derive(Debug, Deserialize)]
pub struct DecideRequest {
    pub approve: bool,
    pub decided_by: String,
    pub decision_note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecideByTokenRequest {
    pub approve: bool,
    pub decided_by: Option<String>,
    pub decision_note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct BackendHealthEntry {
    pub name: String,
    pub state: String,
    pub window_failure_count: usize,
}

// ==== Route Handlers ====

/// `GET /v1/channels/:channel/events` — subscribes to `channel`'s SSE
/// fan-out, resuming from the client's `Last-Event-ID` header when present.
async fn subscribe_channel(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    headers: HeaderMap,
) -> Sse<cortex_sse::Connection> {
    let last_event_id = headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let connection = state.sse.connect(&channel, last_event_id);
    Sse::new(connection)
}

/// `POST /v1/approvals/:id/decide` — authenticated dashboard/API decision
/// path, identified directly by the request's id.
async fn decide_by_id(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(body): Json<DecideRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = state
        .approvals
        .decide(ApprovalRequestId::from_uuid(id), body.approve, body.decided_by, body.decision_note)
        .await?;
    Ok(Json(request))
}

/// `POST /v1/approvals/by-token/:token/decide` — unauthenticated magic-link
/// decision path, identified by the one-time plaintext token.
async fn decide_by_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(body): Json<DecideByTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = state
        .approvals
        .decide_by_token(&token, body.approve, body.decided_by, body.decision_note)
        .await?;
    Ok(Json(request))
}

/// `GET /v1/health/backends` — registry + breaker snapshot.
async fn health_backends(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot: Vec<BackendHealthEntry> = state
        .registry
        .snapshot()
        .into_iter()
        .map(|entry| BackendHealthEntry {
            name: entry.name,
            state: format!("{:?}", entry.state),
            window_failure_count: entry.window_failure_count,
        })
        .collect();
    Json(snapshot)
}

/// `GET /v1/health` — liveness.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse { status: "ok", uptime_seconds: elapsed_seconds(state.start_time) })
}

fn elapsed_seconds(start: Instant) -> u64 {
    start.elapsed().as_secs()
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
