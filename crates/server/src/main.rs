// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cortexd`: wires the Postgres-backed store/queue, the backend registry,
//! the SSE fan-out manager, the execution worker pool, and the expiration
//! reaper together, then serves the thin HTTP/SSE surface. Collapses every
//! crate-boundary `thiserror` error into `anyhow::Result` at the edge, the
//! way a daemon binary collapses errors around its own listener/engine setup.

mod config;
mod error;
mod routes;
mod state;

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use cortex_approval::ApprovalService;
use cortex_backend::{HttpBackend, Registry};
use cortex_core::SystemClock;
use cortex_queue::PgQueue;
use cortex_sse::SseManager;
use cortex_storage::PgStore;
use cortex_worker::{ExecutionWorker, PoolConfig, Reaper, ReaperConfig, WorkerConfig, WorkerPool};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = Config::parse();
    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(PgStore::connect(&config.database_url).await?);
    store.run_migrations().await?;
    let queue = Arc::new(PgQueue::connect(&config.database_url).await?);
    queue.run_migrations().await?;

    let registry = Arc::new(build_registry()?);
    let sse = Arc::new(SseManager::new());
    let clock = SystemClock;
    let approvals = Arc::new(ApprovalService::new(store.clone(), queue.clone(), clock.clone()));

    let worker = Arc::new(ExecutionWorker::new(
        store.clone(),
        registry.clone(),
        queue.clone(),
        sse.clone(),
        approvals.clone(),
        clock.clone(),
        WorkerConfig::default(),
    ));
    let pool = Arc::new(WorkerPool::new(
        worker,
        queue.clone(),
        clock.clone(),
        PoolConfig { concurrency: config.worker_concurrency, ..PoolConfig::default() },
    ));
    let pool_handles = pool.spawn();
    tracing::info!(concurrency = config.worker_concurrency, "worker pool started");

    let reaper = Arc::new(Reaper::new(
        store.clone(),
        queue.clone(),
        approvals.clone(),
        clock,
        ReaperConfig { poll_interval: config.reap_poll_interval(), reap_after: config.reap_after() },
    ));
    let reaper_handle = reaper.spawn();
    tracing::info!("expiration reaper started");

    let state = AppState { store, registry, sse, approvals, start_time: Instant::now() };
    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "cortexd listening");
    axum::serve(listener, app).await?;

    reaper_handle.abort();
    for handle in pool_handles {
        handle.abort();
    }
    Ok(())
}

/// Registers every backend named by `CORTEX_BACKEND_<NAME>_ENDPOINT`
/// environment variables. Channel-specific adapter wiring beyond a bare
/// HTTP endpoint is out of scope here; operators needing something richer
/// construct their own `Registry` by embedding this crate's pieces.
fn build_registry() -> anyhow::Result<Registry> {
    let mut builder = Registry::builder();
    for (key, value) in std::env::vars() {
        let Some(name) = key.strip_prefix("CORTEX_BACKEND_").and_then(|s| s.strip_suffix("_ENDPOINT")) else {
            continue;
        };
        let name = name.to_lowercase();
        let backend = HttpBackend::new(name.clone(), value)?;
        builder = builder.register(name, Arc::new(backend), 8, 5, Duration::from_secs(60));
    }
    Ok(builder.build())
}
