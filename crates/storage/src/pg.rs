// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Postgres-backed `Store`. Every status-changing write is a single
//! `UPDATE ... WHERE status = $expected` statement; `jobs_enforce_transition`
//! (see `migrations/0001_init.up.sql`) is a second, database-side check of
//! the same graph `cortex_core::job::transition` validates in-process.
//!
//! Queries are written by hand rather than with the `sqlx::query!` compile-time
//! macros, since there is no live database available at build time to check
//! them against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cortex_core::{
    Agent, AgentId, AgentStatus, ApprovalAuditEntry, ApprovalAuditEntryId, ApprovalRequest,
    ApprovalRequestId, ApprovalStatus, AuditEventType, Job, JobError, JobId, JobStatus,
    MessageRole, RiskLevel, Session, SessionId, SessionMessage, SessionStatus,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::store::{JobTransitionUpdate, Store, StoreError};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self::new(pool))
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

fn job_status_str(status: JobStatus) -> &'static str {
    use JobStatus::*;
    match status {
        Pending => "pending",
        Scheduled => "scheduled",
        Running => "running",
        WaitingForApproval => "waiting_for_approval",
        Retrying => "retrying",
        Failed => "failed",
        Completed => "completed",
        TimedOut => "timed_out",
        DeadLetter => "dead_letter",
    }
}

fn parse_job_status(raw: &str) -> Result<JobStatus, StoreError> {
    use JobStatus::*;
    Ok(match raw {
        "pending" => Pending,
        "scheduled" => Scheduled,
        "running" => Running,
        "waiting_for_approval" => WaitingForApproval,
        "retrying" => Retrying,
        "failed" => Failed,
        "completed" => Completed,
        "timed_out" => TimedOut,
        "dead_letter" => DeadLetter,
        other => return Err(StoreError::Backend(format!("unknown job status {other}"))),
    })
}

fn parse_approval_status(raw: &str) -> Result<ApprovalStatus, StoreError> {
    use ApprovalStatus::*;
    Ok(match raw {
        "pending" => Pending,
        "approved" => Approved,
        "rejected" => Rejected,
        "expired" => Expired,
        other => return Err(StoreError::Backend(format!("unknown approval status {other}"))),
    })
}

fn approval_status_str(status: ApprovalStatus) -> &'static str {
    use ApprovalStatus::*;
    match status {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Expired => "expired",
    }
}

fn parse_risk_level(raw: &str) -> Result<RiskLevel, StoreError> {
    use RiskLevel::*;
    Ok(match raw {
        "P0" => P0,
        "P1" => P1,
        "P2" => P2,
        "P3" => P3,
        other => return Err(StoreError::Backend(format!("unknown risk level {other}"))),
    })
}

fn parse_agent_status(raw: &str) -> Result<AgentStatus, StoreError> {
    use AgentStatus::*;
    Ok(match raw {
        "active" => Active,
        "inactive" => Inactive,
        other => return Err(StoreError::Backend(format!("unknown agent status {other}"))),
    })
}

fn agent_status_str(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::Active => "active",
        AgentStatus::Inactive => "inactive",
    }
}

fn parse_session_status(raw: &str) -> Result<SessionStatus, StoreError> {
    use SessionStatus::*;
    Ok(match raw {
        "active" => Active,
        "closed" => Closed,
        other => return Err(StoreError::Backend(format!("unknown session status {other}"))),
    })
}

fn parse_message_role(raw: &str) -> Result<MessageRole, StoreError> {
    use MessageRole::*;
    Ok(match raw {
        "user" => User,
        "assistant" => Assistant,
        other => return Err(StoreError::Backend(format!("unknown message role {other}"))),
    })
}

fn parse_event_type(raw: &str) -> Result<AuditEventType, StoreError> {
    use AuditEventType::*;
    Ok(match raw {
        "request_created" => RequestCreated,
        "request_decided" => RequestDecided,
        "request_expired" => RequestExpired,
        "notification_sent" => NotificationSent,
        "unauthorized_attempt" => UnauthorizedAttempt,
        other => return Err(StoreError::Backend(format!("unknown audit event type {other}"))),
    })
}

fn event_type_str(event_type: AuditEventType) -> &'static str {
    use AuditEventType::*;
    match event_type {
        RequestCreated => "request_created",
        RequestDecided => "request_decided",
        RequestExpired => "request_expired",
        NotificationSent => "notification_sent",
        UnauthorizedAttempt => "unauthorized_attempt",
    }
}

fn row_to_job(row: PgRow) -> Result<Job, StoreError> {
    let status: String = row.try_get("status").map_err(|e| StoreError::Backend(e.to_string()))?;
    let error: Option<serde_json::Value> =
        row.try_get("error").map_err(|e| StoreError::Backend(e.to_string()))?;
    Ok(Job {
        id: JobId::from_uuid(row.try_get("id").map_err(|e| StoreError::Backend(e.to_string()))?),
        agent_id: AgentId::from_uuid(row.try_get("agent_id").map_err(|e| StoreError::Backend(e.to_string()))?),
        session_id: row
            .try_get::<Option<uuid::Uuid>, _>("session_id")
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .map(SessionId::from_uuid),
        status: parse_job_status(&status)?,
        priority: row.try_get("priority").map_err(|e| StoreError::Backend(e.to_string()))?,
        payload: row.try_get("payload").map_err(|e| StoreError::Backend(e.to_string()))?,
        result: row.try_get("result").map_err(|e| StoreError::Backend(e.to_string()))?,
        checkpoint: row.try_get("checkpoint").map_err(|e| StoreError::Backend(e.to_string()))?,
        error: error.map(serde_json::from_value).transpose().map_err(|e| StoreError::Backend(e.to_string()))?,
        attempt: row.try_get("attempt").map_err(|e| StoreError::Backend(e.to_string()))?,
        max_attempts: row.try_get("max_attempts").map_err(|e| StoreError::Backend(e.to_string()))?,
        timeout_seconds: row.try_get("timeout_seconds").map_err(|e| StoreError::Backend(e.to_string()))?,
        created_at: row.try_get("created_at").map_err(|e| StoreError::Backend(e.to_string()))?,
        updated_at: row.try_get("updated_at").map_err(|e| StoreError::Backend(e.to_string()))?,
        started_at: row.try_get("started_at").map_err(|e| StoreError::Backend(e.to_string()))?,
        completed_at: row.try_get("completed_at").map_err(|e| StoreError::Backend(e.to_string()))?,
        heartbeat_at: row.try_get("heartbeat_at").map_err(|e| StoreError::Backend(e.to_string()))?,
        approval_expires_at: row.try_get("approval_expires_at").map_err(|e| StoreError::Backend(e.to_string()))?,
    })
}

fn row_to_approval_request(row: PgRow) -> Result<ApprovalRequest, StoreError> {
    let status: String = row.try_get("status").map_err(|e| StoreError::Backend(e.to_string()))?;
    let risk_level: String = row.try_get("risk_level").map_err(|e| StoreError::Backend(e.to_string()))?;
    Ok(ApprovalRequest {
        id: ApprovalRequestId::from_uuid(row.try_get("id").map_err(|e| StoreError::Backend(e.to_string()))?),
        job_id: JobId::from_uuid(row.try_get("job_id").map_err(|e| StoreError::Backend(e.to_string()))?),
        action_type: row.try_get("action_type").map_err(|e| StoreError::Backend(e.to_string()))?,
        action_summary: row.try_get("action_summary").map_err(|e| StoreError::Backend(e.to_string()))?,
        action_detail: row.try_get("action_detail").map_err(|e| StoreError::Backend(e.to_string()))?,
        token_hash: row.try_get("token_hash").map_err(|e| StoreError::Backend(e.to_string()))?,
        status: parse_approval_status(&status)?,
        requested_at: row.try_get("requested_at").map_err(|e| StoreError::Backend(e.to_string()))?,
        decided_at: row.try_get("decided_at").map_err(|e| StoreError::Backend(e.to_string()))?,
        decided_by: row.try_get("decided_by").map_err(|e| StoreError::Backend(e.to_string()))?,
        expires_at: row.try_get("expires_at").map_err(|e| StoreError::Backend(e.to_string()))?,
        risk_level: parse_risk_level(&risk_level)?,
        resume_payload: row.try_get("resume_payload").map_err(|e| StoreError::Backend(e.to_string()))?,
        blast_radius: row.try_get("blast_radius").map_err(|e| StoreError::Backend(e.to_string()))?,
        notification_channels: row
            .try_get("notification_channels")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        decision_note: row.try_get("decision_note").map_err(|e| StoreError::Backend(e.to_string()))?,
        approver_user_account_id: row
            .try_get("approver_user_account_id")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
    })
}

#[async_trait]
impl Store for PgStore {
    async fn create_agent(&self, agent: Agent) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO agents (id, name, slug, role, model_config, skill_config, resource_limits, \
             channel_permissions, requires_approval, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(agent.id.as_uuid())
        .bind(&agent.name)
        .bind(&agent.slug)
        .bind(&agent.role)
        .bind(&agent.model_config)
        .bind(&agent.skill_config)
        .bind(&agent.resource_limits)
        .bind(&agent.channel_permissions)
        .bind(agent.requires_approval)
        .bind(agent_status_str(agent.status))
        .bind(agent.created_at)
        .bind(agent.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get_agent(&self, id: AgentId) -> Result<Option<Agent>, StoreError> {
        let row = sqlx::query("SELECT * FROM agents WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let Some(row) = row else { return Ok(None) };
        let status: String = row.try_get("status").map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Some(Agent {
            id: AgentId::from_uuid(row.try_get("id").map_err(|e| StoreError::Backend(e.to_string()))?),
            name: row.try_get("name").map_err(|e| StoreError::Backend(e.to_string()))?,
            slug: row.try_get("slug").map_err(|e| StoreError::Backend(e.to_string()))?,
            role: row.try_get("role").map_err(|e| StoreError::Backend(e.to_string()))?,
            model_config: row.try_get("model_config").map_err(|e| StoreError::Backend(e.to_string()))?,
            skill_config: row.try_get("skill_config").map_err(|e| StoreError::Backend(e.to_string()))?,
            resource_limits: row.try_get("resource_limits").map_err(|e| StoreError::Backend(e.to_string()))?,
            channel_permissions: row
                .try_get("channel_permissions")
                .map_err(|e| StoreError::Backend(e.to_string()))?,
            requires_approval: row.try_get("requires_approval").map_err(|e| StoreError::Backend(e.to_string()))?,
            status: parse_agent_status(&status)?,
            created_at: row.try_get("created_at").map_err(|e| StoreError::Backend(e.to_string()))?,
            updated_at: row.try_get("updated_at").map_err(|e| StoreError::Backend(e.to_string()))?,
        }))
    }

    async fn create_session(&self, session: Session) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sessions (id, agent_id, status, metadata, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(session.id.as_uuid())
        .bind(session.agent_id.as_uuid())
        .bind(match session.status {
            SessionStatus::Active => "active",
            SessionStatus::Closed => "closed",
        })
        .bind(&session.metadata)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let Some(row) = row else { return Ok(None) };
        let status: String = row.try_get("status").map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Some(Session {
            id: SessionId::from_uuid(row.try_get("id").map_err(|e| StoreError::Backend(e.to_string()))?),
            agent_id: AgentId::from_uuid(row.try_get("agent_id").map_err(|e| StoreError::Backend(e.to_string()))?),
            status: parse_session_status(&status)?,
            metadata: row.try_get("metadata").map_err(|e| StoreError::Backend(e.to_string()))?,
            created_at: row.try_get("created_at").map_err(|e| StoreError::Backend(e.to_string()))?,
            updated_at: row.try_get("updated_at").map_err(|e| StoreError::Backend(e.to_string()))?,
        }))
    }

    async fn append_session_message(&self, message: SessionMessage) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO session_messages (id, session_id, role, content, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(message.id.as_uuid())
            .bind(message.session_id.as_uuid())
            .bind(match message.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
            })
            .bind(&message.content)
            .bind(message.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn create_job(&self, job: Job) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO jobs (id, agent_id, session_id, status, priority, payload, result, checkpoint, error, \
             attempt, max_attempts, timeout_seconds, created_at, updated_at, started_at, completed_at, \
             heartbeat_at, approval_expires_at) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18)",
        )
        .bind(job.id.as_uuid())
        .bind(job.agent_id.as_uuid())
        .bind(job.session_id.map(|s| s.as_uuid()))
        .bind(job_status_str(job.status))
        .bind(job.priority)
        .bind(&job.payload)
        .bind(&job.result)
        .bind(&job.checkpoint)
        .bind(job.error.as_ref().map(|e| serde_json::to_value(e).unwrap_or_default()))
        .bind(job.attempt)
        .bind(job.max_attempts)
        .bind(job.timeout_seconds)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.heartbeat_at)
        .bind(job.approval_expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(row_to_job).transpose()
    }

    async fn cas_job_transition(
        &self,
        id: JobId,
        from: JobStatus,
        to: JobStatus,
        update: JobTransitionUpdate,
    ) -> Result<Option<Job>, StoreError> {
        let error_json = match update.error {
            Some(Some(ref e)) => Some(serde_json::to_value(e).map_err(|e| StoreError::Backend(e.to_string()))?),
            Some(None) => None,
            None => None,
        };
        let row = sqlx::query(
            "UPDATE jobs SET \
                status = $1, \
                updated_at = now(), \
                attempt = attempt + CASE WHEN $2 THEN 1 ELSE 0 END, \
                started_at = COALESCE($3, started_at), \
                completed_at = COALESCE($4, completed_at), \
                heartbeat_at = COALESCE($5, heartbeat_at), \
                approval_expires_at = CASE WHEN $6 THEN $7 ELSE approval_expires_at END, \
                result = COALESCE($8, result), \
                checkpoint = COALESCE($9, checkpoint), \
                error = CASE WHEN $10 THEN $11 ELSE error END \
             WHERE id = $12 AND status = $13 \
             RETURNING *",
        )
        .bind(job_status_str(to))
        .bind(update.increment_attempt)
        .bind(update.started_at)
        .bind(update.completed_at)
        .bind(update.heartbeat_at)
        .bind(update.approval_expires_at.is_some())
        .bind(update.approval_expires_at.flatten())
        .bind(&update.result)
        .bind(&update.checkpoint)
        .bind(update.error.is_some())
        .bind(error_json)
        .bind(id.as_uuid())
        .bind(job_status_str(from))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(row_to_job).transpose()
    }

    async fn list_dead_heartbeat_jobs(&self, threshold: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM jobs WHERE status = 'running' AND (heartbeat_at IS NULL OR heartbeat_at < $1)",
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter().map(row_to_job).collect()
    }

    async fn touch_heartbeat(&self, id: JobId, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE jobs SET heartbeat_at = $2 WHERE id = $1 AND status = 'running'")
            .bind(id.as_uuid())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_approval_request(&self, request: ApprovalRequest) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO approval_requests (id, job_id, action_type, action_summary, action_detail, token_hash, \
             status, requested_at, decided_at, decided_by, expires_at, risk_level, resume_payload, blast_radius, \
             notification_channels, decision_note, approver_user_account_id) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17)",
        )
        .bind(request.id.as_uuid())
        .bind(request.job_id.as_uuid())
        .bind(&request.action_type)
        .bind(&request.action_summary)
        .bind(&request.action_detail)
        .bind(&request.token_hash)
        .bind(approval_status_str(request.status))
        .bind(request.requested_at)
        .bind(request.decided_at)
        .bind(&request.decided_by)
        .bind(request.expires_at)
        .bind(request.risk_level.to_string())
        .bind(&request.resume_payload)
        .bind(&request.blast_radius)
        .bind(&request.notification_channels)
        .bind(&request.decision_note)
        .bind(&request.approver_user_account_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get_approval_request(&self, id: ApprovalRequestId) -> Result<Option<ApprovalRequest>, StoreError> {
        let row = sqlx::query("SELECT * FROM approval_requests WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(row_to_approval_request).transpose()
    }

    async fn get_approval_request_by_token_hash(&self, token_hash: &str) -> Result<Option<ApprovalRequest>, StoreError> {
        let row = sqlx::query("SELECT * FROM approval_requests WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(row_to_approval_request).transpose()
    }

    async fn get_latest_approval_request_for_job(&self, job_id: JobId) -> Result<Option<ApprovalRequest>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM approval_requests WHERE job_id = $1 ORDER BY requested_at DESC LIMIT 1",
        )
        .bind(job_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(row_to_approval_request).transpose()
    }

    async fn cas_approval_decide(
        &self,
        id: ApprovalRequestId,
        to: ApprovalStatus,
        decided_at: DateTime<Utc>,
        decided_by: Option<String>,
        decision_note: Option<String>,
    ) -> Result<Option<ApprovalRequest>, StoreError> {
        let row = sqlx::query(
            "UPDATE approval_requests SET status = $1, decided_at = $2, decided_by = $3, decision_note = $4 \
             WHERE id = $5 AND status = 'pending' RETURNING *",
        )
        .bind(approval_status_str(to))
        .bind(decided_at)
        .bind(decided_by)
        .bind(decision_note)
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(row_to_approval_request).transpose()
    }

    async fn list_expired_pending_requests(&self, now: DateTime<Utc>) -> Result<Vec<ApprovalRequest>, StoreError> {
        let rows = sqlx::query("SELECT * FROM approval_requests WHERE status = 'pending' AND expires_at <= $1")
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter().map(row_to_approval_request).collect()
    }

    async fn append_audit_entry(&self, entry: ApprovalAuditEntry) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO approval_audit_entries (id, approval_request_id, job_id, event_type, actor, channel, \
             details, created_at) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)",
        )
        .bind(entry.id.as_uuid())
        .bind(entry.approval_request_id.as_uuid())
        .bind(entry.job_id.as_uuid())
        .bind(event_type_str(entry.event_type))
        .bind(&entry.actor)
        .bind(&entry.channel)
        .bind(&entry.details)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn list_audit_trail(&self, request_id: ApprovalRequestId) -> Result<Vec<ApprovalAuditEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM approval_audit_entries WHERE approval_request_id = $1 ORDER BY created_at ASC",
        )
        .bind(request_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter()
            .map(|row| {
                let event_type: String = row.try_get("event_type").map_err(|e| StoreError::Backend(e.to_string()))?;
                Ok(ApprovalAuditEntry {
                    id: ApprovalAuditEntryId::from_uuid(row.try_get("id").map_err(|e| StoreError::Backend(e.to_string()))?),
                    approval_request_id: ApprovalRequestId::from_uuid(
                        row.try_get("approval_request_id").map_err(|e| StoreError::Backend(e.to_string()))?,
                    ),
                    job_id: JobId::from_uuid(row.try_get("job_id").map_err(|e| StoreError::Backend(e.to_string()))?),
                    event_type: parse_event_type(&event_type)?,
                    actor: row.try_get("actor").map_err(|e| StoreError::Backend(e.to_string()))?,
                    channel: row.try_get("channel").map_err(|e| StoreError::Backend(e.to_string()))?,
                    details: row.try_get("details").map_err(|e| StoreError::Backend(e.to_string()))?,
                    created_at: row.try_get("created_at").map_err(|e| StoreError::Backend(e.to_string()))?,
                })
            })
            .collect()
    }

    async fn last_audit_entry_hash(&self, request_id: ApprovalRequestId) -> Result<Option<String>, StoreError> {
        let row = sqlx::query(
            "SELECT details FROM approval_audit_entries WHERE approval_request_id = $1 \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(request_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        let Some(row) = row else { return Ok(None) };
        let details: serde_json::Value = row.try_get("details").map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(details.get("entry_hash").and_then(|v| v.as_str()).map(str::to_owned))
    }
}
