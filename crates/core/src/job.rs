// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifier and lifecycle state machine.
//!
//! `transition` is the single source of truth for which moves are legal;
//! both the in-memory
//! `MemStore` and the `PgStore`'s CAS predicate must agree with it so a
//! trigger-rejected write in Postgres and a rejected `transition()` call in
//! tests describe the same graph.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a job.
    pub struct JobId("job_");
}

/// Queue task name bound to `ExecutionWorker::agent_execute`. Shared between
/// `cortex-worker` (the pool binding it to a claim loop) and
/// `cortex-approval` (re-enqueueing it once a gated job is approved) so the
/// literal lives in one place.
pub const AGENT_EXECUTE_TASK: &str = "agent_execute";

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Scheduled,
    Running,
    WaitingForApproval,
    Retrying,
    Failed,
    Completed,
    TimedOut,
    DeadLetter,
}

crate::simple_display! {
    JobStatus {
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

impl JobStatus {
    /// The set of terminal statuses is closed — no transition leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::TimedOut | JobStatus::DeadLetter)
    }
}

/// Error returned when a caller attempts a transition outside the legal graph.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("illegal job transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Validate a job status transition against the legal transition graph.
///
/// This is a pure predicate; callers are responsible for making the actual
/// move atomic (the Postgres CAS `WHERE status = $expected`, or a
/// `parking_lot::Mutex`-guarded swap in `MemStore`).
pub fn transition(from: JobStatus, to: JobStatus) -> Result<(), InvalidTransition> {
    use JobStatus::*;
    let legal = matches!(
        (from, to),
        (Pending, Scheduled)
            | (Scheduled, Running)
            | (Running, Completed)
            | (Running, Failed)
            | (Running, TimedOut)
            | (Running, WaitingForApproval)
            | (WaitingForApproval, Running)
            | (WaitingForApproval, Failed)
            | (Failed, Retrying)
            | (Failed, DeadLetter)
            | (Retrying, Scheduled)
    );
    if legal {
        Ok(())
    } else {
        Err(InvalidTransition { from, to })
    }
}

/// Error category carried on a job's `error` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Transient,
    Permanent,
    Timeout,
    Resource,
}

impl ErrorCategory {
    /// Only `Transient` and `Resource` outcomes are retried and count toward
    /// the backend's circuit breaker.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCategory::Transient | ErrorCategory::Resource)
    }

    pub fn counts_toward_breaker(self) -> bool {
        matches!(self, ErrorCategory::Transient | ErrorCategory::Resource)
    }
}

/// Structured job error document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobError {
    pub category: ErrorCategory,
    pub message: String,
}

/// A durable unit of agent work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub agent_id: crate::agent::AgentId,
    pub session_id: Option<crate::session::SessionId>,
    pub status: JobStatus,
    pub priority: i32,
    pub payload: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub checkpoint: Option<serde_json::Value>,
    pub error: Option<JobError>,
    pub attempt: i32,
    pub max_attempts: i32,
    pub timeout_seconds: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub heartbeat_at: Option<chrono::DateTime<chrono::Utc>>,
    pub approval_expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Job {
    pub fn new(agent_id: crate::agent::AgentId, payload: serde_json::Value, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            id: JobId::new(),
            agent_id,
            session_id: None,
            status: JobStatus::Pending,
            priority: 0,
            payload,
            result: None,
            checkpoint: None,
            error: None,
            attempt: 0,
            max_attempts: 3,
            timeout_seconds: 600,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            heartbeat_at: None,
            approval_expires_at: None,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
