// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable task queue contract: enqueue by key, run-at delay, claim for
//! a worker pool. Implementations own the retry timer — callers never
//! compute backoff themselves, they call `retry_with_backoff`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue job not found")]
    NotFound,
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Default)]
pub struct AddJobOptions {
    /// Delay before the job becomes claimable; defaults to immediately.
    pub run_at: Option<DateTime<Utc>>,
    pub max_attempts: Option<i32>,
    /// Deduplication key — a second `add_job` with the same key while a
    /// pending/in-progress row exists is a no-op that returns the existing id.
    pub job_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClaimedTask {
    pub id: Uuid,
    pub task_name: String,
    pub payload: serde_json::Value,
    pub job_key: Option<String>,
    pub attempts: i32,
    pub max_attempts: i32,
}

/// A durable task queue: enqueue by key, run-at delay, and a claim
/// operation a worker pool polls to pull the next ready task.
///
/// `core only consumes this interface` — a Postgres-backed implementation
/// is provided (`PgQueue`); an in-process implementation may be swapped in
/// for tests without touching callers.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Enqueue `task_name` with `payload`. If `opts.job_key` is set and a
    /// pending/in-progress row with that key already exists, returns its id
    /// without inserting a duplicate (`exec:<jobId>` cannot queue twice).
    async fn add_job(
        &self,
        task_name: &str,
        payload: serde_json::Value,
        opts: AddJobOptions,
    ) -> Result<Uuid, QueueError>;

    /// Atomically claim and mark `in_progress` the oldest pending row, among
    /// `task_names`, whose `run_at` has passed. Returns `None` when nothing
    /// is ready.
    async fn claim_next(
        &self,
        task_names: &[String],
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimedTask>, QueueError>;

    /// Mark a claimed task done, removing it from the queue.
    async fn complete(&self, id: Uuid) -> Result<(), QueueError>;

    /// Reschedule a claimed task for retry at `now + backoff(attempt)`,
    /// recording the new attempt count.
    async fn retry_with_backoff(&self, id: Uuid, attempt: i32, now: DateTime<Utc>) -> Result<(), QueueError>;

    /// Drop a task permanently (attempts exhausted and not retryable).
    async fn abandon(&self, id: Uuid) -> Result<(), QueueError>;
}
