// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Store` trait: every status-changing write goes through a
//! compare-and-swap predicate (`WHERE status = $expected`) so concurrent
//! workers racing on the same job or approval request can tell who won.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cortex_core::{
    Agent, AgentId, ApprovalAuditEntry, ApprovalRequest, ApprovalRequestId, ApprovalStatus, Job,
    JobError, JobId, JobStatus, Session, SessionId, SessionMessage,
};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Field updates applied alongside a job status CAS.
///
/// `cas_transition` only ever moves a job from `from` to `to` if the row's
/// current status is still `from`; the fields below are written in the
/// same statement so a reader never observes a status change without its
/// companion data (e.g. `Running` without `started_at`).
#[derive(Debug, Clone, Default)]
pub struct JobTransitionUpdate {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub approval_expires_at: Option<Option<DateTime<Utc>>>,
    pub increment_attempt: bool,
    pub result: Option<Value>,
    pub checkpoint: Option<Value>,
    pub error: Option<Option<JobError>>,
}

impl JobTransitionUpdate {
    pub fn with_heartbeat(now: DateTime<Utc>) -> Self {
        Self { heartbeat_at: Some(now), ..Default::default() }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_agent(&self, agent: Agent) -> Result<(), StoreError>;
    async fn get_agent(&self, id: AgentId) -> Result<Option<Agent>, StoreError>;

    async fn create_session(&self, session: Session) -> Result<(), StoreError>;
    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StoreError>;
    async fn append_session_message(&self, message: SessionMessage) -> Result<(), StoreError>;

    async fn create_job(&self, job: Job) -> Result<(), StoreError>;
    async fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError>;

    /// Move `id` from `from` to `to`, applying `update`, iff its current
    /// status is still `from`. Returns the post-update row on success, or
    /// `Ok(None)` if another writer already moved it away from `from`.
    async fn cas_job_transition(
        &self,
        id: JobId,
        from: JobStatus,
        to: JobStatus,
        update: JobTransitionUpdate,
    ) -> Result<Option<Job>, StoreError>;

    /// Jobs stuck in `Running` whose `heartbeat_at` is older than `threshold`.
    async fn list_dead_heartbeat_jobs(&self, threshold: DateTime<Utc>) -> Result<Vec<Job>, StoreError>;

    /// Bump `heartbeat_at` on a still-`Running` job. Returns `false` (not an
    /// error) if the job has moved on — the caller's heartbeat loop should
    /// stop, not retry.
    async fn touch_heartbeat(&self, id: JobId, now: DateTime<Utc>) -> Result<bool, StoreError>;

    async fn create_approval_request(&self, request: ApprovalRequest) -> Result<(), StoreError>;
    async fn get_approval_request(&self, id: ApprovalRequestId) -> Result<Option<ApprovalRequest>, StoreError>;
    async fn get_approval_request_by_token_hash(&self, token_hash: &str) -> Result<Option<ApprovalRequest>, StoreError>;

    /// The most recently requested approval request for `job_id`, if any —
    /// used by the worker's approval gate check (exactly one logical gate
    /// per job at a time).
    async fn get_latest_approval_request_for_job(&self, job_id: JobId) -> Result<Option<ApprovalRequest>, StoreError>;

    /// Decide a request iff it is still `Pending`. Returns the decided row
    /// on success, `Ok(None)` if someone else already decided or expired it.
    async fn cas_approval_decide(
        &self,
        id: ApprovalRequestId,
        to: ApprovalStatus,
        decided_at: DateTime<Utc>,
        decided_by: Option<String>,
        decision_note: Option<String>,
    ) -> Result<Option<ApprovalRequest>, StoreError>;

    async fn list_expired_pending_requests(&self, now: DateTime<Utc>) -> Result<Vec<ApprovalRequest>, StoreError>;

    async fn append_audit_entry(&self, entry: ApprovalAuditEntry) -> Result<(), StoreError>;
    async fn list_audit_trail(&self, request_id: ApprovalRequestId) -> Result<Vec<ApprovalAuditEntry>, StoreError>;
    async fn last_audit_entry_hash(&self, request_id: ApprovalRequestId) -> Result<Option<String>, StoreError>;
}
