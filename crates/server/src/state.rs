// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared application state handed to every route, mirroring the shape of
//! `ListenCtx` (one struct of `Arc`s passed to every request handler) and
//! `ob-poc-web`'s `AppState`.

use std::sync::Arc;
use std::time::Instant;

use cortex_approval::ApprovalService;
use cortex_backend::Registry;
use cortex_core::SystemClock;
use cortex_sse::SseManager;
use cortex_storage::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub registry: Arc<Registry>,
    pub sse: Arc<SseManager>,
    pub approvals: Arc<ApprovalService<SystemClock>>,
    pub start_time: Instant,
}
