// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory `Queue` double, behind the same trait as `PgQueue`, used by
//! `cortex-worker`'s tests so CAS/claim races can be exercised with real
//! concurrent tasks instead of mocks.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::backoff::calculate_backoff;
use crate::queue::{AddJobOptions, ClaimedTask, Queue, QueueError};

#[derive(Clone)]
struct Row {
    task_name: String,
    payload: serde_json::Value,
    job_key: Option<String>,
    status: Status,
    run_at: DateTime<Utc>,
    attempts: i32,
    max_attempts: i32,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Status {
    Pending,
    InProgress,
    Done,
}

pub struct MemQueue {
    rows: Mutex<HashMap<Uuid, Row>>,
}

impl Default for MemQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemQueue {
    pub fn new() -> Self {
        Self { rows: Mutex::new(HashMap::new()) }
    }
}

#[async_trait]
impl Queue for MemQueue {
    async fn add_job(
        &self,
        task_name: &str,
        payload: serde_json::Value,
        opts: AddJobOptions,
    ) -> Result<Uuid, QueueError> {
        let mut rows = self.rows.lock();
        if let Some(job_key) = &opts.job_key {
            if let Some((id, _)) =
                rows.iter().find(|(_, r)| r.job_key.as_deref() == Some(job_key.as_str()) && r.status != Status::Done)
            {
                return Ok(*id);
            }
        }

        let id = Uuid::new_v4();
        rows.insert(
            id,
            Row {
                task_name: task_name.to_string(),
                payload,
                job_key: opts.job_key,
                status: Status::Pending,
                run_at: opts.run_at.unwrap_or_else(Utc::now),
                attempts: 0,
                max_attempts: opts.max_attempts.unwrap_or(1),
            },
        );
        Ok(id)
    }

    async fn claim_next(
        &self,
        task_names: &[String],
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimedTask>, QueueError> {
        let mut rows = self.rows.lock();
        let candidate = rows
            .iter()
            .filter(|(_, r)| r.status == Status::Pending && r.run_at <= now && task_names.contains(&r.task_name))
            .min_by_key(|(_, r)| r.run_at)
            .map(|(id, _)| *id);

        let Some(id) = candidate else { return Ok(None) };
        let Some(row) = rows.get_mut(&id) else { return Ok(None) };
        row.status = Status::InProgress;

        Ok(Some(ClaimedTask {
            id,
            task_name: row.task_name.clone(),
            payload: row.payload.clone(),
            job_key: row.job_key.clone(),
            attempts: row.attempts,
            max_attempts: row.max_attempts,
        }))
    }

    async fn complete(&self, id: Uuid) -> Result<(), QueueError> {
        let mut rows = self.rows.lock();
        let row = rows.get_mut(&id).ok_or(QueueError::NotFound)?;
        row.status = Status::Done;
        Ok(())
    }

    async fn retry_with_backoff(&self, id: Uuid, attempt: i32, now: DateTime<Utc>) -> Result<(), QueueError> {
        let mut rows = self.rows.lock();
        let row = rows.get_mut(&id).ok_or(QueueError::NotFound)?;
        let backoff = calculate_backoff(attempt);
        row.status = Status::Pending;
        row.attempts = attempt;
        row.run_at = now
            + chrono::Duration::from_std(backoff)
                .map_err(|e| QueueError::Backend(format!("backoff out of range: {e}")))?;
        Ok(())
    }

    async fn abandon(&self, id: Uuid) -> Result<(), QueueError> {
        let mut rows = self.rows.lock();
        rows.remove(&id).ok_or(QueueError::NotFound)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "mem_tests.rs"]
mod tests;
