// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker pool: `concurrency` tasks each loop claim → dispatch → claim,
//! the way the daemon's worker wakes on a poll timer and pulls whatever is
//! ready. Parallelism across jobs comes from running several of these loops
//! side by side; ordering within a single job is still owned by the CAS
//! chain in `agent_execute` itself.

use std::sync::Arc;
use std::time::Duration;

use cortex_core::{Clock, JobId};
use cortex_queue::Queue;
use uuid::Uuid;

use crate::worker::{ExecutionWorker, TASK_NAME};

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub concurrency: usize,
    pub idle_poll_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { concurrency: 4, idle_poll_interval: Duration::from_millis(500) }
    }
}

/// Drives `concurrency` independent claim loops against the same queue.
pub struct WorkerPool<C: Clock> {
    worker: Arc<ExecutionWorker<C>>,
    queue: Arc<dyn Queue>,
    clock: C,
    config: PoolConfig,
}

impl<C: Clock> WorkerPool<C> {
    pub fn new(worker: Arc<ExecutionWorker<C>>, queue: Arc<dyn Queue>, clock: C, config: PoolConfig) -> Self {
        Self { worker, queue, clock, config }
    }

    /// Spawn `concurrency` claim loops, returning their join handles so the
    /// caller can await a clean shutdown.
    pub fn spawn(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        (0..self.config.concurrency.max(1))
            .map(|slot| {
                let pool = self.clone();
                tokio::spawn(async move { pool.run_slot(slot).await })
            })
            .collect()
    }

    async fn run_slot(&self, slot: usize) {
        let task_names = [TASK_NAME.to_string()];
        loop {
            let claimed = self.queue.claim_next(&task_names, self.clock.utc_now()).await;
            match claimed {
                Ok(Some(task)) => {
                    if let Some(job_id) = parse_job_id(&task.payload) {
                        tracing::info!(slot, %job_id, "claimed job");
                        if let Err(error) = self.worker.agent_execute(job_id).await {
                            tracing::warn!(slot, %job_id, %error, "agent_execute failed");
                        }
                    } else {
                        tracing::warn!(slot, task_id = %task.id, "claimed task with no parseable jobId");
                    }
                    if let Err(error) = self.queue.complete(task.id).await {
                        tracing::warn!(slot, %error, "failed to mark claimed task complete");
                    }
                }
                Ok(None) => tokio::time::sleep(self.config.idle_poll_interval).await,
                Err(error) => {
                    tracing::warn!(slot, %error, "claim_next failed");
                    tokio::time::sleep(self.config.idle_poll_interval).await;
                }
            }
        }
    }
}

fn parse_job_id(payload: &serde_json::Value) -> Option<JobId> {
    let raw = payload.get("jobId")?.as_str()?;
    Uuid::parse_str(raw).ok().map(JobId::from_uuid)
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
