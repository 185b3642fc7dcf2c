// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `Queue` over Postgres: claim is `SELECT ... FOR UPDATE SKIP LOCKED` so
//! multiple worker-pool replicas can poll the same table without blocking
//! each other on a row another replica is already handling.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::backoff::calculate_backoff;
use crate::queue::{AddJobOptions, ClaimedTask, Queue, QueueError};

pub struct PgQueue {
    pool: PgPool,
}

impl PgQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, QueueError> {
        let pool = PgPool::connect(database_url).await.map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(Self::new(pool))
    }

    pub async fn run_migrations(&self) -> Result<(), QueueError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))
    }
}

#[async_trait]
impl Queue for PgQueue {
    async fn add_job(
        &self,
        task_name: &str,
        payload: serde_json::Value,
        opts: AddJobOptions,
    ) -> Result<Uuid, QueueError> {
        if let Some(job_key) = &opts.job_key {
            let existing = sqlx::query("SELECT id FROM queue_jobs WHERE job_key = $1 AND status != 'done'")
                .bind(job_key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| QueueError::Backend(e.to_string()))?;
            if let Some(row) = existing {
                let id: Uuid = row.try_get("id").map_err(|e| QueueError::Backend(e.to_string()))?;
                return Ok(id);
            }
        }

        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO queue_jobs (id, task_name, payload, job_key, status, run_at, attempts, max_attempts)
             VALUES ($1, $2, $3, $4, 'pending', $5, 0, $6)",
        )
        .bind(id)
        .bind(task_name)
        .bind(&payload)
        .bind(&opts.job_key)
        .bind(opts.run_at.unwrap_or_else(Utc::now))
        .bind(opts.max_attempts.unwrap_or(1))
        .execute(&self.pool)
        .await
        .map_err(|e| QueueError::Backend(e.to_string()))?;

        Ok(id)
    }

    async fn claim_next(
        &self,
        task_names: &[String],
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimedTask>, QueueError> {
        let mut tx = self.pool.begin().await.map_err(|e| QueueError::Backend(e.to_string()))?;

        let row = sqlx::query(
            "SELECT id, task_name, payload, job_key, attempts, max_attempts
             FROM queue_jobs
             WHERE status = 'pending' AND run_at <= $1 AND task_name = ANY($2)
             ORDER BY run_at ASC
             LIMIT 1
             FOR UPDATE SKIP LOCKED",
        )
        .bind(now)
        .bind(task_names)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| QueueError::Backend(e.to_string()))?;

        let Some(row) = row else {
            tx.commit().await.map_err(|e| QueueError::Backend(e.to_string()))?;
            return Ok(None);
        };

        let id: Uuid = row.try_get("id").map_err(|e| QueueError::Backend(e.to_string()))?;
        sqlx::query("UPDATE queue_jobs SET status = 'in_progress', claimed_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        tx.commit().await.map_err(|e| QueueError::Backend(e.to_string()))?;

        Ok(Some(ClaimedTask {
            id,
            task_name: row.try_get("task_name").map_err(|e| QueueError::Backend(e.to_string()))?,
            payload: row.try_get("payload").map_err(|e| QueueError::Backend(e.to_string()))?,
            job_key: row.try_get("job_key").map_err(|e| QueueError::Backend(e.to_string()))?,
            attempts: row.try_get("attempts").map_err(|e| QueueError::Backend(e.to_string()))?,
            max_attempts: row.try_get("max_attempts").map_err(|e| QueueError::Backend(e.to_string()))?,
        }))
    }

    async fn complete(&self, id: Uuid) -> Result<(), QueueError> {
        let result = sqlx::query("UPDATE queue_jobs SET status = 'done' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound);
        }
        Ok(())
    }

    async fn retry_with_backoff(&self, id: Uuid, attempt: i32, now: DateTime<Utc>) -> Result<(), QueueError> {
        let backoff = calculate_backoff(attempt);
        let run_at = now
            + chrono::Duration::from_std(backoff)
                .map_err(|e| QueueError::Backend(format!("backoff out of range: {e}")))?;

        let result = sqlx::query(
            "UPDATE queue_jobs SET status = 'pending', run_at = $2, attempts = $3, claimed_at = NULL
             WHERE id = $1",
        )
        .bind(id)
        .bind(run_at)
        .bind(attempt)
        .execute(&self.pool)
        .await
        .map_err(|e| QueueError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound);
        }
        Ok(())
    }

    async fn abandon(&self, id: Uuid) -> Result<(), QueueError> {
        let result = sqlx::query("DELETE FROM queue_jobs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(QueueError::NotFound);
        }
        Ok(())
    }
}
