// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ApprovalService`: request creation, single-use decision, token lookup,
//! and stale-request expiry, each call appending to the hash-chained audit
//! log. Validation ordering (not found → already decided → expired → not
//! authorized for the caller's error messages) follows
//! `handle_decision_resolve`'s check-then-mutate-then-emit shape. Deciding
//! or expiring a request also settles the job it gates: approval resumes
//! it onto the queue, rejection and expiry fail it outright.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use cortex_audit::{compute_entry_hash, generate_approval_token, hash_token, is_valid_token_format};
use cortex_core::{
    ApprovalAuditEntry, ApprovalAuditEntryId, ApprovalRequest, ApprovalRequestId, ApprovalStatus,
    AuditEventType, Clock, ErrorCategory, JobError, JobId, JobStatus, RiskLevel, MAX_APPROVAL_TTL,
};
use cortex_queue::{AddJobOptions, Queue};
use cortex_storage::{JobTransitionUpdate, Store, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("approval request not found")]
    NotFound,
    #[error("approval request already decided")]
    AlreadyDecided,
    #[error("approval request expired")]
    Expired,
    #[error("caller is not authorized to decide this approval request")]
    NotAuthorized,
    #[error("malformed token")]
    MalformedToken,
    #[error("ttl exceeds maximum of {0:?}")]
    TtlExceedsMax(chrono::Duration),
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("queue error: {0}")]
    Queue(#[from] cortex_queue::QueueError),
}

pub struct NewRequest {
    pub job_id: JobId,
    pub action_type: String,
    pub action_summary: String,
    pub action_detail: serde_json::Value,
    pub risk_level: RiskLevel,
    pub resume_payload: Option<serde_json::Value>,
    pub blast_radius: Option<String>,
    pub notification_channels: serde_json::Value,
    pub approver_user_account_id: Option<String>,
    /// Overrides `risk_level.default_ttl()` when present; validated against
    /// `MAX_APPROVAL_TTL`.
    pub ttl_override: Option<chrono::Duration>,
}

/// Result of creating a request: the stored row plus the one-time plaintext
/// token. The plaintext is never persisted — only its hash is — so this is
/// the caller's only chance to deliver it (e.g. in a notification).
pub struct CreatedRequest {
    pub request: ApprovalRequest,
    pub plaintext_token: String,
}

pub struct ApprovalService<C: Clock> {
    store: Arc<dyn Store>,
    queue: Arc<dyn Queue>,
    clock: C,
}

impl<C: Clock> ApprovalService<C> {
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn Queue>, clock: C) -> Self {
        Self { store, queue, clock }
    }

    pub async fn create_request(&self, new: NewRequest) -> Result<CreatedRequest, ApprovalError> {
        let ttl = new.ttl_override.unwrap_or_else(|| new.risk_level.default_ttl());
        if ttl > MAX_APPROVAL_TTL {
            return Err(ApprovalError::TtlExceedsMax(MAX_APPROVAL_TTL));
        }

        let now = self.clock.utc_now();
        let plaintext_token = generate_approval_token();
        let auto_approve = new.risk_level.is_auto_approvable();

        let request = ApprovalRequest {
            id: ApprovalRequestId::new(),
            job_id: new.job_id,
            action_type: new.action_type,
            action_summary: new.action_summary,
            action_detail: new.action_detail,
            token_hash: hash_token(&plaintext_token),
            status: if auto_approve { ApprovalStatus::Approved } else { ApprovalStatus::Pending },
            requested_at: now,
            decided_at: if auto_approve { Some(now) } else { None },
            decided_by: if auto_approve { Some("system:auto-approval".to_string()) } else { None },
            expires_at: now + ttl,
            risk_level: new.risk_level,
            resume_payload: new.resume_payload,
            blast_radius: new.blast_radius,
            notification_channels: new.notification_channels,
            decision_note: None,
            approver_user_account_id: new.approver_user_account_id,
        };

        self.store.create_approval_request(request.clone()).await?;
        self.append_audit(&request, AuditEventType::RequestCreated, None, None, now).await?;
        if auto_approve {
            self.append_audit(
                &request,
                AuditEventType::RequestDecided,
                Some("system:auto-approval"),
                None,
                now,
            )
            .await?;
        }

        Ok(CreatedRequest { request, plaintext_token })
    }

    pub async fn get_request(&self, id: ApprovalRequestId) -> Result<ApprovalRequest, ApprovalError> {
        self.store.get_approval_request(id).await?.ok_or(ApprovalError::NotFound)
    }

    pub async fn get_audit_trail(&self, id: ApprovalRequestId) -> Result<Vec<ApprovalAuditEntry>, ApprovalError> {
        Ok(self.store.list_audit_trail(id).await?)
    }

    /// Decide a request identified directly by id (dashboard/API path,
    /// authenticated callers).
    pub async fn decide(
        &self,
        id: ApprovalRequestId,
        approve: bool,
        decided_by: String,
        decision_note: Option<String>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let request = self.get_request(id).await?;
        self.apply_decision(request, approve, Some(decided_by), decision_note).await
    }

    /// Decide a request identified by a one-time plaintext token
    /// (unauthenticated magic-link path — Slack/email button click).
    pub async fn decide_by_token(
        &self,
        plaintext_token: &str,
        approve: bool,
        decided_by: Option<String>,
        decision_note: Option<String>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        if !is_valid_token_format(plaintext_token) {
            return Err(ApprovalError::MalformedToken);
        }
        let token_hash = hash_token(plaintext_token);
        let request = self
            .store
            .get_approval_request_by_token_hash(&token_hash)
            .await?
            .ok_or(ApprovalError::NotFound)?;
        self.apply_decision(request, approve, decided_by, decision_note).await
    }

    async fn apply_decision(
        &self,
        request: ApprovalRequest,
        approve: bool,
        decided_by: Option<String>,
        decision_note: Option<String>,
    ) -> Result<ApprovalRequest, ApprovalError> {
        if request.status != ApprovalStatus::Pending {
            return Err(ApprovalError::AlreadyDecided);
        }
        let now = self.clock.utc_now();
        if request.expires_at <= now {
            return Err(ApprovalError::Expired);
        }
        if let Some(expected) = &request.approver_user_account_id {
            if decided_by.as_deref() != Some(expected.as_str()) {
                self.record_unauthorized_attempt(&request, decided_by.as_deref()).await?;
                return Err(ApprovalError::NotAuthorized);
            }
        }

        let to = if approve { ApprovalStatus::Approved } else { ApprovalStatus::Rejected };
        let decided = self
            .store
            .cas_approval_decide(request.id, to, now, decided_by.clone(), decision_note)
            .await?
            .ok_or(ApprovalError::AlreadyDecided)?;

        self.append_audit(&decided, AuditEventType::RequestDecided, decided_by.as_deref(), None, now).await?;

        if approve {
            self.resume_job(decided.job_id).await?;
        } else {
            self.fail_job(decided.job_id, "approval request rejected", now).await?;
        }

        Ok(decided)
    }

    /// Transition every still-pending request whose `expires_at` has passed
    /// to `Expired`, recording one audit entry per request and failing the
    /// job each one gates. Returns the count of requests actually expired.
    pub async fn expire_stale_requests(&self, now: DateTime<Utc>) -> Result<usize, ApprovalError> {
        let expired_candidates = self.store.list_expired_pending_requests(now).await?;
        let mut count = 0;
        for candidate in expired_candidates {
            let Some(expired) = self
                .store
                .cas_approval_decide(candidate.id, ApprovalStatus::Expired, now, None, None)
                .await?
            else {
                continue;
            };
            self.append_audit(&expired, AuditEventType::RequestExpired, None, None, now).await?;
            self.fail_job(expired.job_id, "Approval request expired", now).await?;
            count += 1;
        }
        Ok(count)
    }

    /// Bounce a job straight back out of a gate its own request already
    /// auto-approved (a P3 risk tier) before the gate-opening caller's CAS
    /// into `WaitingForApproval` even had a chance to take effect. Callers
    /// open the gate unconditionally, then call this right after — it is a
    /// no-op whenever `request.status` isn't `Approved`.
    pub async fn resume_if_already_approved(
        &self,
        job_id: JobId,
        request: &ApprovalRequest,
    ) -> Result<(), ApprovalError> {
        if request.status == ApprovalStatus::Approved {
            self.resume_job(job_id).await?;
        }
        Ok(())
    }

    /// CAS the gated job `WaitingForApproval` → `Running` and re-enqueue its
    /// `agent_execute` delivery so the worker picks the run back up. A no-op
    /// if the job already left `WaitingForApproval` (e.g. a duplicate
    /// decision racing the CAS in `apply_decision`).
    async fn resume_job(&self, job_id: JobId) -> Result<(), ApprovalError> {
        let update = JobTransitionUpdate { approval_expires_at: Some(None), ..Default::default() };
        let resumed = self
            .store
            .cas_job_transition(job_id, JobStatus::WaitingForApproval, JobStatus::Running, update)
            .await?;
        if resumed.is_some() {
            self.queue
                .add_job(
                    cortex_core::AGENT_EXECUTE_TASK,
                    serde_json::json!({"jobId": job_id}),
                    AddJobOptions {
                        run_at: None,
                        max_attempts: Some(1),
                        job_key: Some(format!("exec:{job_id}")),
                    },
                )
                .await?;
        }
        Ok(())
    }

    /// CAS the gated job `WaitingForApproval` → `Failed` with a permanent
    /// error. Used by both rejection and expiry.
    async fn fail_job(&self, job_id: JobId, message: &str, now: DateTime<Utc>) -> Result<(), ApprovalError> {
        let error = JobError { category: ErrorCategory::Permanent, message: message.to_string() };
        let update = JobTransitionUpdate {
            completed_at: Some(now),
            error: Some(Some(error)),
            approval_expires_at: Some(None),
            ..Default::default()
        };
        self.store.cas_job_transition(job_id, JobStatus::WaitingForApproval, JobStatus::Failed, update).await?;
        Ok(())
    }

    pub async fn record_notification_sent(
        &self,
        request: &ApprovalRequest,
        channel: &str,
    ) -> Result<(), ApprovalError> {
        let now = self.clock.utc_now();
        self.append_audit(request, AuditEventType::NotificationSent, None, Some(channel), now).await
    }

    pub async fn record_unauthorized_attempt(
        &self,
        request: &ApprovalRequest,
        actor: Option<&str>,
    ) -> Result<(), ApprovalError> {
        let now = self.clock.utc_now();
        self.append_audit(request, AuditEventType::UnauthorizedAttempt, actor, None, now).await
    }

    async fn append_audit(
        &self,
        request: &ApprovalRequest,
        event_type: AuditEventType,
        actor: Option<&str>,
        channel: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), ApprovalError> {
        let previous_hash = self.store.last_audit_entry_hash(request.id).await?;
        let mut details = serde_json::json!({});
        if event_type == AuditEventType::RequestDecided {
            let entry_hash = compute_entry_hash(
                &request.id.to_string(),
                &request.status.to_string(),
                actor.unwrap_or(""),
                &now.to_rfc3339(),
                previous_hash.as_deref(),
            );
            details = serde_json::json!({ "entry_hash": entry_hash, "previous_hash": previous_hash });
        }

        let entry = ApprovalAuditEntry {
            id: ApprovalAuditEntryId::new(),
            approval_request_id: request.id,
            job_id: request.job_id,
            event_type,
            actor: actor.map(str::to_owned),
            channel: channel.map(str::to_owned),
            details,
            created_at: now,
        };
        self.store.append_audit_entry(entry).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
