// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Backend` trait: the execution-engine abstraction a job is routed
//! to. Each implementation (local subprocess, remote HTTP API) turns an
//! `ExecutionTask` into a `Handle` the worker can poll for `OutputEvent`s
//! and cancel.

use async_trait::async_trait;
use cortex_core::{AgentId, JobError, JobId};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::handle::Handle;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("transient error: {0}")]
    Transient(String),
    #[error("permanent error: {0}")]
    Permanent(String),
}

impl BackendError {
    /// Map a backend-level error onto a job's retry-eligible error category.
    pub fn category(&self) -> cortex_core::ErrorCategory {
        use cortex_core::ErrorCategory::*;
        match self {
            BackendError::Unavailable(_) => Resource,
            BackendError::SpawnFailed(_) => Transient,
            BackendError::TimedOut(_) => Timeout,
            BackendError::Transient(_) => Transient,
            BackendError::Permanent(_) => Permanent,
        }
    }
}

/// The kind of work an `Instruction` asks a backend to do. Registered
/// backends advertise which of these they support in `Capabilities`, and
/// the registry's router refuses to send a task to a backend that doesn't.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GoalType {
    CodeEdit,
    CodeGenerate,
    CodeReview,
    ShellCommand,
    Research,
}

/// One turn of a prior conversation, carried for backends that need it as
/// context rather than replaying the whole session transcript themselves.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
}

/// What the agent is being asked to do.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub prompt: String,
    pub goal_type: GoalType,
    pub target_files: Vec<String>,
    pub conversation_history: Vec<ConversationTurn>,
}

/// Everything the backend needs to situate the instruction: where it's
/// running, what it already knows, and what a resolved skill contributes.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub workspace_path: Option<String>,
    pub system_prompt: Option<String>,
    pub memories: Vec<String>,
    pub relevant_files: Vec<String>,
    pub environment: HashMap<String, String>,
    pub skill_instructions: Option<String>,
}

/// Limits and permissions bounding how the backend may carry out the
/// instruction. `allowed_tools`/`denied_tools` and the two access booleans
/// are narrowed/widened by skill resolution before a task is built — see
/// `ExecutionWorker::build_task`.
#[derive(Debug, Clone)]
pub struct Constraints {
    pub timeout_ms: u64,
    pub max_tokens: Option<u32>,
    pub model: Option<String>,
    pub allowed_tools: Vec<String>,
    pub denied_tools: Vec<String>,
    pub max_turns: Option<u32>,
    pub network_access: bool,
    pub shell_access: bool,
}

impl Constraints {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// A unit of work handed to a backend. `checkpoint`, when present, lets a
/// backend resume a job that previously entered `WaitingForApproval` rather
/// than starting over.
#[derive(Debug, Clone)]
pub struct ExecutionTask {
    pub job_id: JobId,
    pub agent_id: AgentId,
    pub instruction: Instruction,
    pub context: ExecutionContext,
    pub constraints: Constraints,
    pub checkpoint: Option<Value>,
}

/// Token accounting attached to a `usage` event.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
}

/// An event observed while a task runs. `Handle::events` yields these as a
/// stream; the worker relays them onto the job's SSE channel and persists
/// checkpoints/approval requests as they arrive.
#[derive(Debug, Clone)]
pub enum OutputEvent {
    /// Incremental text output, forwarded to the SSE channel as-is.
    Text(String),
    /// The backend invoked a tool.
    ToolUse { tool_name: String, tool_input: Value },
    /// A previously-invoked tool returned.
    ToolResult { tool_name: String, output: Value, is_error: bool },
    /// Token accounting for work done so far.
    Usage(TokenUsage),
    /// The backend wants to checkpoint progress so a later resume can pick
    /// up from here.
    Checkpoint(Value),
    /// The backend needs human approval before continuing; the worker
    /// transitions the job to `WaitingForApproval` and opens a gate.
    ApprovalRequired { action_type: String, summary: String, detail: Value },
    /// The task finished successfully.
    Completed(Value),
    /// The task failed; `error.category` drives retry/breaker accounting.
    Failed(JobError),
}

/// Result of a backend's own health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone)]
pub struct BackendHealth {
    pub status: HealthStatus,
    pub latency_ms: u64,
    pub reason: Option<String>,
}

/// What a backend can do, advertised once at registration time and used by
/// the registry's router to avoid sending unsupported work to it.
#[derive(Debug, Clone)]
pub struct Capabilities {
    pub streaming: bool,
    pub file_edit: bool,
    pub shell: bool,
    pub token_usage: bool,
    pub cancellation: bool,
    pub supported_goals: Vec<GoalType>,
    pub max_context_tokens: u32,
}

impl Capabilities {
    pub fn supports(&self, goal: GoalType) -> bool {
        self.supported_goals.contains(&goal)
    }
}

#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Stable identifier used in breaker/permit bookkeeping and logs.
    fn name(&self) -> &str;

    /// One-time setup before the backend accepts work. Most backends have
    /// nothing to do here; subprocess/remote backends that hold a
    /// long-lived connection or process pool override it.
    async fn start(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Release anything `start` acquired. Called on graceful shutdown.
    async fn stop(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// A cheap, side-effect-free probe of whether the backend can currently
    /// accept work. The registry does not gate routing on this directly —
    /// that's the breaker's job — but it's surfaced on `/health/backends`.
    async fn health_check(&self) -> BackendHealth {
        BackendHealth { status: HealthStatus::Healthy, latency_ms: 0, reason: None }
    }

    /// What this backend supports, consulted by the registry's router.
    fn capabilities(&self) -> Capabilities;

    /// Start executing `task`, returning a `Handle` to its event stream.
    /// Implementations should return promptly — `Handle` owns the actual
    /// long-running work — so a slow backend can't block the caller's
    /// permit acquisition loop.
    async fn execute(&self, task: ExecutionTask) -> Result<Handle, BackendError>;
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;
