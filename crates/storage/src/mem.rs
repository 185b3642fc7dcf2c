// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory `Store` double for unit and integration tests. CAS semantics
//! are enforced the same way `PgStore`'s `WHERE status = $expected`
//! predicate does, just guarded by a `parking_lot::Mutex` instead of a
//! row lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cortex_core::{
    Agent, AgentId, ApprovalAuditEntry, ApprovalRequest, ApprovalRequestId, ApprovalStatus, Job,
    JobId, JobStatus, Session, SessionId, SessionMessage,
};
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::store::{JobTransitionUpdate, Store, StoreError};

#[derive(Default)]
struct Tables {
    agents: HashMap<AgentId, Agent>,
    sessions: HashMap<SessionId, Session>,
    session_messages: Vec<SessionMessage>,
    jobs: HashMap<JobId, Job>,
    approval_requests: HashMap<ApprovalRequestId, ApprovalRequest>,
    audit_entries: Vec<ApprovalAuditEntry>,
}

#[derive(Default)]
pub struct MemStore {
    tables: Mutex<Tables>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_update(job: &mut Job, to: JobStatus, update: &JobTransitionUpdate) {
    job.status = to;
    if update.increment_attempt {
        job.attempt += 1;
    }
    if let Some(v) = update.started_at {
        job.started_at = Some(v);
    }
    if let Some(v) = update.completed_at {
        job.completed_at = Some(v);
    }
    if let Some(v) = update.heartbeat_at {
        job.heartbeat_at = Some(v);
    }
    if let Some(v) = update.approval_expires_at.clone() {
        job.approval_expires_at = v;
    }
    if let Some(v) = update.result.clone() {
        job.result = Some(v);
    }
    if let Some(v) = update.checkpoint.clone() {
        job.checkpoint = Some(v);
    }
    if let Some(v) = update.error.clone() {
        job.error = v;
    }
}

#[async_trait]
impl Store for MemStore {
    async fn create_agent(&self, agent: Agent) -> Result<(), StoreError> {
        self.tables.lock().agents.insert(agent.id, agent);
        Ok(())
    }

    async fn get_agent(&self, id: AgentId) -> Result<Option<Agent>, StoreError> {
        Ok(self.tables.lock().agents.get(&id).cloned())
    }

    async fn create_session(&self, session: Session) -> Result<(), StoreError> {
        self.tables.lock().sessions.insert(session.id, session);
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self.tables.lock().sessions.get(&id).cloned())
    }

    async fn append_session_message(&self, message: SessionMessage) -> Result<(), StoreError> {
        self.tables.lock().session_messages.push(message);
        Ok(())
    }

    async fn create_job(&self, job: Job) -> Result<(), StoreError> {
        self.tables.lock().jobs.insert(job.id, job);
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.tables.lock().jobs.get(&id).cloned())
    }

    async fn cas_job_transition(
        &self,
        id: JobId,
        from: JobStatus,
        to: JobStatus,
        update: JobTransitionUpdate,
    ) -> Result<Option<Job>, StoreError> {
        let mut tables = self.tables.lock();
        let Some(job) = tables.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if job.status != from {
            return Ok(None);
        }
        apply_update(job, to, &update);
        job.updated_at = update
            .heartbeat_at
            .or(update.started_at)
            .or(update.completed_at)
            .unwrap_or(job.updated_at);
        Ok(Some(job.clone()))
    }

    async fn list_dead_heartbeat_jobs(&self, threshold: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
        Ok(self
            .tables
            .lock()
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Running && j.heartbeat_at.map(|h| h < threshold).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn touch_heartbeat(&self, id: JobId, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock();
        let Some(job) = tables.jobs.get_mut(&id) else { return Ok(false) };
        if job.status != JobStatus::Running {
            return Ok(false);
        }
        job.heartbeat_at = Some(now);
        Ok(true)
    }

    async fn create_approval_request(&self, request: ApprovalRequest) -> Result<(), StoreError> {
        self.tables.lock().approval_requests.insert(request.id, request);
        Ok(())
    }

    async fn get_approval_request(&self, id: ApprovalRequestId) -> Result<Option<ApprovalRequest>, StoreError> {
        Ok(self.tables.lock().approval_requests.get(&id).cloned())
    }

    async fn get_approval_request_by_token_hash(&self, token_hash: &str) -> Result<Option<ApprovalRequest>, StoreError> {
        Ok(self
            .tables
            .lock()
            .approval_requests
            .values()
            .find(|r| r.token_hash == token_hash)
            .cloned())
    }

    async fn get_latest_approval_request_for_job(&self, job_id: JobId) -> Result<Option<ApprovalRequest>, StoreError> {
        Ok(self
            .tables
            .lock()
            .approval_requests
            .values()
            .filter(|r| r.job_id == job_id)
            .max_by_key(|r| r.requested_at)
            .cloned())
    }

    async fn cas_approval_decide(
        &self,
        id: ApprovalRequestId,
        to: ApprovalStatus,
        decided_at: DateTime<Utc>,
        decided_by: Option<String>,
        decision_note: Option<String>,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        let mut tables = self.tables.lock();
        let Some(request) = tables.approval_requests.get_mut(&id) else {
            return Ok(None);
        };
        if request.status != ApprovalStatus::Pending {
            return Ok(None);
        }
        request.status = to;
        request.decided_at = Some(decided_at);
        request.decided_by = decided_by;
        request.decision_note = decision_note;
        Ok(Some(request.clone()))
    }

    async fn list_expired_pending_requests(&self, now: DateTime<Utc>) -> Result<Vec<ApprovalRequest>, StoreError> {
        Ok(self
            .tables
            .lock()
            .approval_requests
            .values()
            .filter(|r| r.status == ApprovalStatus::Pending && r.expires_at <= now)
            .cloned()
            .collect())
    }

    async fn append_audit_entry(&self, entry: ApprovalAuditEntry) -> Result<(), StoreError> {
        self.tables.lock().audit_entries.push(entry);
        Ok(())
    }

    async fn list_audit_trail(&self, request_id: ApprovalRequestId) -> Result<Vec<ApprovalAuditEntry>, StoreError> {
        Ok(self
            .tables
            .lock()
            .audit_entries
            .iter()
            .filter(|e| e.approval_request_id == request_id)
            .cloned()
            .collect())
    }

    async fn last_audit_entry_hash(&self, request_id: ApprovalRequestId) -> Result<Option<String>, StoreError> {
        Ok(self
            .tables
            .lock()
            .audit_entries
            .iter()
            .rev()
            .find(|e| e.approval_request_id == request_id)
            .and_then(|e| e.details.get("entry_hash"))
            .and_then(|v| v.as_str())
            .map(str::to_owned))
    }
}

#[cfg(test)]
#[path = "mem_tests.rs"]
mod tests;
