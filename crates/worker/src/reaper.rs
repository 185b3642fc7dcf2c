// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The expiration reaper: two cron-style sweeps run on their own timer,
//! independent of any particular job's worker. Mirrors the background-
//! watcher idiom (a `tokio::time::interval` loop spawned once at startup)
//! rather than anything job-specific.

use std::sync::Arc;
use std::time::Duration;

use cortex_approval::ApprovalService;
use cortex_core::{Clock, ErrorCategory, JobError, JobStatus};
use cortex_queue::{calculate_backoff, AddJobOptions, Queue};
use cortex_storage::{JobTransitionUpdate, Store};
use serde_json::json;

use crate::worker::{WorkerError, TASK_NAME};

#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// How often each sweep runs.
    pub poll_interval: Duration,
    /// A `Running` job whose `heartbeat_at` is older than this is presumed dead.
    pub reap_after: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_secs(60), reap_after: Duration::from_secs(90) }
    }
}

pub struct Reaper<C: Clock> {
    store: Arc<dyn Store>,
    queue: Arc<dyn Queue>,
    approvals: Arc<ApprovalService<C>>,
    clock: C,
    config: ReaperConfig,
}

impl<C: Clock> Reaper<C> {
    pub fn new(
        store: Arc<dyn Store>,
        queue: Arc<dyn Queue>,
        approvals: Arc<ApprovalService<C>>,
        clock: C,
        config: ReaperConfig,
    ) -> Self {
        Self { store, queue, approvals, clock, config }
    }

    /// Expire every still-pending approval request whose TTL has passed.
    /// Returns the number expired.
    pub async fn expire_stale_approvals(&self) -> Result<usize, WorkerError> {
        Ok(self.approvals.expire_stale_requests(self.clock.utc_now()).await?)
    }

    /// Fail, and where eligible reschedule, jobs whose heartbeat has gone
    /// silent for longer than `reap_after`. Returns the number reaped.
    pub async fn reap_dead_jobs(&self) -> Result<usize, WorkerError> {
        let now = self.clock.utc_now();
        let threshold = now - chrono::Duration::from_std(self.config.reap_after).unwrap_or(chrono::Duration::zero());
        let dead = self.store.list_dead_heartbeat_jobs(threshold).await?;

        let mut reaped = 0usize;
        for job in dead {
            let error = JobError { category: ErrorCategory::Transient, message: "heartbeat lost".into() };
            let update = JobTransitionUpdate { error: Some(Some(error.clone())), ..Default::default() };
            let Some(failed) = self.store.cas_job_transition(job.id, JobStatus::Running, JobStatus::Failed, update).await?
            else {
                continue;
            };
            reaped += 1;

            if error.category.is_retryable() && failed.attempt < failed.max_attempts {
                self.reschedule(failed.id, failed.attempt, now).await?;
            }
        }
        Ok(reaped)
    }

    /// Same CAS chain and backoff curve as the worker's own error path
    /// (`Failed` → `Retrying` → re-enqueue → `Scheduled`).
    async fn reschedule(&self, job_id: cortex_core::JobId, attempt: i32, now: chrono::DateTime<chrono::Utc>) -> Result<(), WorkerError> {
        let Some(_) = self
            .store
            .cas_job_transition(job_id, JobStatus::Failed, JobStatus::Retrying, JobTransitionUpdate::default())
            .await?
        else {
            return Ok(());
        };

        let delay = calculate_backoff(attempt);
        let run_at = now + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::seconds(1));
        self.queue
            .add_job(
                TASK_NAME,
                json!({"jobId": job_id}),
                AddJobOptions {
                    run_at: Some(run_at),
                    max_attempts: Some(1),
                    job_key: Some(format!("exec:{job_id}")),
                },
            )
            .await?;
        self.store
            .cas_job_transition(job_id, JobStatus::Retrying, JobStatus::Scheduled, JobTransitionUpdate::default())
            .await?;
        Ok(())
    }

    /// Run both sweeps on a `poll_interval` ticker until the returned
    /// handle is aborted. Errors are logged, not propagated — a transient
    /// DB error on one tick shouldn't kill the background task.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()>
    where
        C: Clock,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(error) = self.expire_stale_approvals().await {
                    tracing::warn!(%error, "expire_stale_approvals sweep failed");
                }
                if let Err(error) = self.reap_dead_jobs().await {
                    tracing::warn!(%error, "reap_dead_jobs sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;
