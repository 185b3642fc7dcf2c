// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maps each crate-boundary `thiserror` enum onto an HTTP status, the way
//! `adamtc007-ob-poc`'s route handlers return `Result<Json<T>, StatusCode>`
//! — kept to a single shared type here since every route in this surface
//! talks to exactly one service crate.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Approval(#[from] cortex_approval::ApprovalError),
    #[error(transparent)]
    Storage(#[from] cortex_storage::StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Approval(cortex_approval::ApprovalError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Approval(cortex_approval::ApprovalError::AlreadyDecided) => StatusCode::CONFLICT,
            ApiError::Approval(cortex_approval::ApprovalError::Expired) => StatusCode::CONFLICT,
            ApiError::Approval(cortex_approval::ApprovalError::MalformedToken) => StatusCode::BAD_REQUEST,
            ApiError::Approval(cortex_approval::ApprovalError::TtlExceedsMax(_)) => StatusCode::BAD_REQUEST,
            ApiError::Approval(cortex_approval::ApprovalError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}
