// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ExecutionWorker::agent_execute`: drives one job from `Scheduled` to a
//! terminal state. Every status change is a CAS against the store so two
//! workers racing on the same job row can never both win; the heartbeat
//! and cancel-probe timers run cooperatively with event iteration inside
//! the same task, the way an executor runs effect dispatch and its
//! background watchers side by side.

use std::sync::Arc;
use std::time::Duration;

use cortex_approval::{ApprovalService, NewRequest};
use cortex_backend::{
    BackendError, Constraints, ConversationTurn, ExecutionContext, ExecutionTask, GoalType,
    Instruction, OutputEvent, Registry,
};
use cortex_core::{
    Agent, AgentStatus, Clock, ErrorCategory, Job, JobError, JobId, JobStatus, MessageRole,
    RiskLevel, SessionMessage, SessionMessageId,
};
use cortex_queue::{calculate_backoff, AddJobOptions, Queue};
use cortex_sse::SseManager;
use cortex_storage::{JobTransitionUpdate, Store, StoreError};
use serde_json::{json, Value};
use thiserror::Error;

/// Queue task name `cortex-server` binds a worker pool to.
pub const TASK_NAME: &str = cortex_core::AGENT_EXECUTE_TASK;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("queue error: {0}")]
    Queue(#[from] cortex_queue::QueueError),
    #[error("approval error: {0}")]
    Approval(#[from] cortex_approval::ApprovalError),
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub heartbeat_interval: Duration,
    pub cancel_probe_interval: Duration,
    pub permit_acquire_timeout: Duration,
    /// TTL applied to the job's `approval_expires_at` field when the
    /// pre-execution gate opens (separate from an `ApprovalRequest`'s own
    /// TTL, which is driven by its risk level).
    pub approval_gate_ttl: chrono::Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            cancel_probe_interval: Duration::from_secs(5),
            permit_acquire_timeout: Duration::from_secs(60),
            approval_gate_ttl: chrono::Duration::hours(1),
        }
    }
}

/// Outcome of running a dispatched task's event stream to completion.
enum Settlement {
    Terminal {
        status: JobStatus,
        result: Option<Value>,
        error: Option<JobError>,
        checkpoint: Option<Value>,
        succeeded: bool,
    },
    /// A mid-stream `ApprovalRequired` event opened a gate; the job already
    /// moved to `WaitingForApproval` and there is nothing further to settle.
    AwaitingApproval,
}

pub struct ExecutionWorker<C: Clock> {
    store: Arc<dyn Store>,
    registry: Arc<Registry>,
    queue: Arc<dyn Queue>,
    sse: Arc<SseManager>,
    approvals: Arc<ApprovalService<C>>,
    clock: C,
    config: WorkerConfig,
}

impl<C: Clock> ExecutionWorker<C> {
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<Registry>,
        queue: Arc<dyn Queue>,
        sse: Arc<SseManager>,
        approvals: Arc<ApprovalService<C>>,
        clock: C,
        config: WorkerConfig,
    ) -> Self {
        Self { store, registry, queue, sse, approvals, clock, config }
    }

    /// Run the full `agent_execute` contract for `job_id`. Redelivery of a
    /// job that already left `Scheduled` is a silent no-op (step 1) — unless
    /// it's sitting in `Running` with an approved gate, which is exactly
    /// what `ApprovalService::resume_if_already_approved`/`apply_decision`
    /// leave behind when they re-enqueue a gated job; that delivery picks
    /// the run back up rather than repeating the initial CAS.
    pub async fn agent_execute(&self, job_id: JobId) -> Result<(), WorkerError> {
        let Some(job) = self.store.get_job(job_id).await? else {
            return Ok(());
        };

        let job = match job.status {
            JobStatus::Scheduled => {
                let now = self.clock.utc_now();
                let update = JobTransitionUpdate {
                    started_at: Some(now),
                    heartbeat_at: Some(now),
                    increment_attempt: true,
                    ..Default::default()
                };
                match self
                    .store
                    .cas_job_transition(job_id, JobStatus::Scheduled, JobStatus::Running, update)
                    .await?
                {
                    Some(job) => job,
                    None => return Ok(()),
                }
            }
            JobStatus::Running if self.has_approved_request(job_id).await? => job,
            _ => return Ok(()),
        };

        let heartbeat = self.spawn_heartbeat(job_id);
        let outcome = self.run(job).await;
        heartbeat.abort();
        outcome
    }

    fn spawn_heartbeat(&self, job_id: JobId) -> tokio::task::JoinHandle<()> {
        let store = self.store.clone();
        let clock = self.clock.clone();
        let period = self.config.heartbeat_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match store.touch_heartbeat(job_id, clock.utc_now()).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(error) => tracing::warn!(%job_id, %error, "heartbeat write failed"),
                }
            }
        })
    }

    async fn run(&self, job: Job) -> Result<(), WorkerError> {
        let job_id = job.id;
        let channel = job.agent_id.to_string();

        let Some(agent) = self.store.get_agent(job.agent_id).await? else {
            return self
                .settle(
                    job_id,
                    job.attempt,
                    job.max_attempts,
                    JobStatus::Failed,
                    None,
                    Some(permanent_error("agent not found")),
                    None,
                    &channel,
                )
                .await;
        };
        if agent.status != AgentStatus::Active {
            return self
                .settle(
                    job_id,
                    job.attempt,
                    job.max_attempts,
                    JobStatus::Failed,
                    None,
                    Some(permanent_error("agent is not active")),
                    None,
                    &channel,
                )
                .await;
        }

        if agent.requires_approval && !self.has_approved_request(job_id).await? {
            let created = self
                .approvals
                .create_request(NewRequest {
                    job_id,
                    action_type: "execution_start".to_string(),
                    action_summary: "agent configuration requires approval before execution".to_string(),
                    action_detail: json!({}),
                    risk_level: RiskLevel::P1,
                    resume_payload: None,
                    blast_radius: None,
                    notification_channels: json!([]),
                    approver_user_account_id: None,
                    ttl_override: None,
                })
                .await?;
            self.open_approval_gate(job_id, &channel).await?;
            self.approvals.resume_if_already_approved(job_id, &created.request).await?;
            return Ok(());
        }

        self.record_user_turn(&job).await?;

        let task = self.build_task(&job, &agent);
        let preferred = agent.model_config.get("backend").and_then(Value::as_str);
        let backend_name = match self.registry.route_task(&task, preferred) {
            Some(name) => name,
            None => {
                let error = JobError {
                    category: ErrorCategory::Resource,
                    message: "no backend available to dispatch to".into(),
                };
                return self
                    .settle(job_id, job.attempt, job.max_attempts, JobStatus::Failed, None, Some(error), None, &channel)
                    .await;
            }
        };

        let dispatched = match tokio::time::timeout(
            self.config.permit_acquire_timeout,
            self.registry.dispatch(&backend_name, task),
        )
        .await
        {
            Ok(Ok(dispatched)) => dispatched,
            Ok(Err(error)) => {
                self.handle_dispatch_error(job_id, job.attempt, job.max_attempts, error, &channel).await?;
                return Ok(());
            }
            Err(_) => {
                self.handle_dispatch_error(
                    job_id,
                    job.attempt,
                    job.max_attempts,
                    BackendError::Unavailable(format!(
                        "permit acquisition exceeded {:?}",
                        self.config.permit_acquire_timeout
                    )),
                    &channel,
                )
                .await?;
                return Ok(());
            }
        };

        let settlement = self.stream_to_settlement(dispatched.handle, job_id, &channel).await?;

        match settlement {
            Settlement::AwaitingApproval => {}
            Settlement::Terminal { status, result, error, checkpoint, succeeded } => {
                if succeeded {
                    self.registry.record_outcome(&backend_name, true);
                } else if error.as_ref().is_some_and(|e| e.category.counts_toward_breaker()) {
                    self.registry.record_outcome(&backend_name, false);
                }
                self.settle(job_id, job.attempt, job.max_attempts, status, result, error, checkpoint, &channel)
                    .await?;
            }
        }

        Ok(())
    }

    async fn has_approved_request(&self, job_id: JobId) -> Result<bool, WorkerError> {
        Ok(self
            .store
            .get_latest_approval_request_for_job(job_id)
            .await?
            .is_some_and(|r| r.status == cortex_core::ApprovalStatus::Approved))
    }

    async fn open_approval_gate(&self, job_id: JobId, channel: &str) -> Result<(), WorkerError> {
        let now = self.clock.utc_now();
        let update = JobTransitionUpdate {
            approval_expires_at: Some(Some(now + self.config.approval_gate_ttl)),
            ..Default::default()
        };
        if self
            .store
            .cas_job_transition(job_id, JobStatus::Running, JobStatus::WaitingForApproval, update)
            .await?
            .is_some()
        {
            self.sse.broadcast(channel, "agent:state", json!({"state": "waiting_for_approval"}));
        }
        Ok(())
    }

    /// Translate a job's payload and its agent's configuration into the
    /// schema a `Backend` actually consumes. `allowed_tools`/`denied_tools`
    /// are narrowed by intersection / widened by union against whatever the
    /// agent's resolved skill contributes, and the skill's instructions are
    /// appended to the context.
    fn build_task(&self, job: &Job, agent: &Agent) -> ExecutionTask {
        let payload = &job.payload;
        let prompt = payload.get("prompt").and_then(Value::as_str).unwrap_or_default().to_string();
        let goal_type = payload.get("goalType").and_then(Value::as_str).map(parse_goal_type).unwrap_or(GoalType::CodeEdit);
        let target_files = string_array(payload.get("targetFiles"));
        let conversation_history = payload
            .get("conversationHistory")
            .and_then(Value::as_array)
            .map(|turns| {
                turns
                    .iter()
                    .filter_map(|t| {
                        let role = t.get("role")?.as_str()?.to_string();
                        let content = t.get("content")?.as_str()?.to_string();
                        Some(ConversationTurn { role, content })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut allowed_tools = string_array(payload.get("allowedTools"));
        let mut denied_tools = string_array(payload.get("deniedTools"));
        let mut network_access = agent.resource_limits.get("networkAccess").and_then(Value::as_bool).unwrap_or(true);
        let mut shell_access = agent.resource_limits.get("shellAccess").and_then(Value::as_bool).unwrap_or(true);
        let mut skill_instructions = None;
        if let Some(skill) = agent.skill_config.as_object().filter(|s| !s.is_empty()) {
            if let Some(skill_allowed) = skill.get("allowedTools").and_then(Value::as_array) {
                let skill_allowed: Vec<String> =
                    skill_allowed.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
                if !allowed_tools.is_empty() {
                    allowed_tools.retain(|t| skill_allowed.contains(t));
                } else {
                    allowed_tools = skill_allowed;
                }
            }
            if let Some(skill_denied) = skill.get("deniedTools").and_then(Value::as_array) {
                for tool in skill_denied.iter().filter_map(Value::as_str) {
                    if !denied_tools.iter().any(|t| t == tool) {
                        denied_tools.push(tool.to_string());
                    }
                }
            }
            network_access = network_access && skill.get("networkAccess").and_then(Value::as_bool).unwrap_or(true);
            shell_access = shell_access && skill.get("shellAccess").and_then(Value::as_bool).unwrap_or(true);
            skill_instructions = skill.get("instructions").and_then(Value::as_str).map(str::to_string);
        }

        ExecutionTask {
            job_id: job.id,
            agent_id: job.agent_id,
            instruction: Instruction { prompt, goal_type, target_files, conversation_history },
            context: ExecutionContext {
                workspace_path: payload.get("workspacePath").and_then(Value::as_str).map(str::to_string),
                system_prompt: payload.get("systemPrompt").and_then(Value::as_str).map(str::to_string),
                memories: string_array(payload.get("memories")),
                relevant_files: string_array(payload.get("relevantFiles")),
                environment: std::collections::HashMap::new(),
                skill_instructions,
            },
            constraints: Constraints {
                timeout_ms: (job.timeout_seconds.max(0) as u64) * 1000,
                max_tokens: agent.model_config.get("maxTokens").and_then(Value::as_u64).map(|v| v as u32),
                model: agent.model_config.get("model").and_then(Value::as_str).map(str::to_string),
                allowed_tools,
                denied_tools,
                max_turns: agent.resource_limits.get("maxTurns").and_then(Value::as_u64).map(|v| v as u32),
                network_access,
                shell_access,
            },
            checkpoint: job.checkpoint.clone(),
        }
    }

    async fn record_user_turn(&self, job: &Job) -> Result<(), WorkerError> {
        let Some(session_id) = job.session_id else { return Ok(()) };
        let Some(prompt) = job.payload.get("prompt").and_then(Value::as_str) else { return Ok(()) };
        self.store
            .append_session_message(SessionMessage {
                id: SessionMessageId::new(),
                session_id,
                role: MessageRole::User,
                content: prompt.to_string(),
                created_at: self.clock.utc_now(),
            })
            .await?;
        Ok(())
    }

    /// Iterate `handle`'s events, broadcasting each to `channel`, polling
    /// the job row every `cancel_probe_interval` for an external status
    /// change. Returns once a terminal event arrives, a mid-stream approval
    /// gate opens, or the probe observes the job left `Running`.
    async fn stream_to_settlement(
        &self,
        mut handle: cortex_backend::Handle,
        job_id: JobId,
        channel: &str,
    ) -> Result<Settlement, WorkerError> {
        let mut checkpoint: Option<Value> = None;
        let mut cancel_probe = tokio::time::interval(self.config.cancel_probe_interval);
        cancel_probe.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = handle.recv() => {
                    match event {
                        Some(OutputEvent::Text(text)) => {
                            self.sse.broadcast(channel, "agent:output", json!({"text": text}));
                            if let Some(session_id) = self.job_session_id(job_id).await? {
                                self.store
                                    .append_session_message(SessionMessage {
                                        id: SessionMessageId::new(),
                                        session_id,
                                        role: MessageRole::Assistant,
                                        content: text,
                                        created_at: self.clock.utc_now(),
                                    })
                                    .await?;
                            }
                        }
                        Some(OutputEvent::ToolUse { tool_name, tool_input }) => {
                            self.sse.broadcast(
                                channel,
                                "agent:output",
                                json!({"toolUse": {"toolName": tool_name, "toolInput": tool_input}}),
                            );
                        }
                        Some(OutputEvent::ToolResult { tool_name, output, is_error }) => {
                            self.sse.broadcast(
                                channel,
                                "agent:output",
                                json!({"toolResult": {"toolName": tool_name, "output": output, "isError": is_error}}),
                            );
                        }
                        Some(OutputEvent::Usage(usage)) => {
                            self.sse.broadcast(
                                channel,
                                "agent:output",
                                json!({"usage": {
                                    "inputTokens": usage.input_tokens,
                                    "outputTokens": usage.output_tokens,
                                    "costUsd": usage.cost_usd,
                                    "cacheReadTokens": usage.cache_read_tokens,
                                    "cacheCreationTokens": usage.cache_creation_tokens,
                                }}),
                            );
                        }
                        Some(OutputEvent::Checkpoint(value)) => {
                            checkpoint = Some(value);
                        }
                        Some(OutputEvent::ApprovalRequired { action_type, summary, detail }) => {
                            self.open_mid_stream_gate(job_id, channel, action_type, summary, detail).await?;
                            handle.cancel();
                            return Ok(Settlement::AwaitingApproval);
                        }
                        Some(OutputEvent::Completed(result)) => {
                            return Ok(Settlement::Terminal {
                                status: JobStatus::Completed,
                                result: Some(result),
                                error: None,
                                checkpoint,
                                succeeded: true,
                            });
                        }
                        Some(OutputEvent::Failed(error)) => {
                            return Ok(self.classify_failure(error, checkpoint));
                        }
                        None => {
                            return Ok(Settlement::Terminal {
                                status: JobStatus::Failed,
                                result: None,
                                error: Some(JobError {
                                    category: ErrorCategory::Transient,
                                    message: "backend closed its event stream without a terminal event".into(),
                                }),
                                checkpoint,
                                succeeded: false,
                            });
                        }
                    }
                }
                _ = cancel_probe.tick() => {
                    if let Some(current) = self.store.get_job(job_id).await? {
                        if current.status != JobStatus::Running {
                            handle.cancel();
                        }
                    } else {
                        handle.cancel();
                    }
                }
            }
        }
    }

    fn classify_failure(&self, error: JobError, checkpoint: Option<Value>) -> Settlement {
        let status = match error.category {
            ErrorCategory::Timeout => JobStatus::TimedOut,
            _ => JobStatus::Failed,
        };
        Settlement::Terminal { status, result: None, error: Some(error), checkpoint, succeeded: false }
    }

    async fn job_session_id(&self, job_id: JobId) -> Result<Option<cortex_core::SessionId>, WorkerError> {
        Ok(self.store.get_job(job_id).await?.and_then(|j| j.session_id))
    }

    async fn open_mid_stream_gate(
        &self,
        job_id: JobId,
        channel: &str,
        action_type: String,
        summary: String,
        detail: Value,
    ) -> Result<(), WorkerError> {
        let created = self
            .approvals
            .create_request(NewRequest {
                job_id,
                action_type,
                action_summary: summary,
                action_detail: detail,
                risk_level: RiskLevel::P1,
                resume_payload: None,
                blast_radius: None,
                notification_channels: json!([]),
                approver_user_account_id: None,
                ttl_override: None,
            })
            .await?;
        self.open_approval_gate(job_id, channel).await?;
        self.approvals.resume_if_already_approved(job_id, &created.request).await
    }

    /// CAS `Running` into `status`, or run the retry/dead-letter path if
    /// `status` is `Failed` and the error is retryable with attempts left.
    #[allow(clippy::too_many_arguments)]
    async fn settle(
        &self,
        job_id: JobId,
        attempt: i32,
        max_attempts: i32,
        status: JobStatus,
        result: Option<Value>,
        error: Option<JobError>,
        checkpoint: Option<Value>,
        channel: &str,
    ) -> Result<(), WorkerError> {
        let retryable = error.as_ref().is_some_and(|e| e.category.is_retryable());
        if status == JobStatus::Failed && retryable && attempt < max_attempts {
            self.retry(job_id, attempt, error).await?;
            self.sse.broadcast(channel, "agent:state", json!({"state": "retrying"}));
            return Ok(());
        }

        let now = self.clock.utc_now();
        let update = JobTransitionUpdate {
            completed_at: Some(now),
            result: result.clone(),
            error: Some(error.clone()),
            checkpoint,
            ..Default::default()
        };
        self.store.cas_job_transition(job_id, JobStatus::Running, status, update).await?;
        self.sse.broadcast(
            channel,
            "agent:complete",
            json!({"status": status.to_string(), "result": result, "error": error}),
        );
        Ok(())
    }

    async fn retry(&self, job_id: JobId, attempt: i32, error: Option<JobError>) -> Result<(), WorkerError> {
        let now = self.clock.utc_now();
        let update = JobTransitionUpdate { error: Some(error), ..Default::default() };
        let Some(_) = self.store.cas_job_transition(job_id, JobStatus::Running, JobStatus::Failed, update).await?
        else {
            return Ok(());
        };
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

    async fn handle_dispatch_error(
        &self,
        job_id: JobId,
        attempt: i32,
        max_attempts: i32,
        error: BackendError,
        channel: &str,
    ) -> Result<(), WorkerError> {
        let category = error.category();
        let job_error = JobError { category, message: error.to_string() };
        let status = match category {
            ErrorCategory::Timeout => JobStatus::TimedOut,
            _ => JobStatus::Failed,
        };
        self.settle(job_id, attempt, max_attempts, status, None, Some(job_error), None, channel).await
    }
}

fn permanent_error(message: &str) -> JobError {
    JobError { category: ErrorCategory::Permanent, message: message.to_string() }
}

fn parse_goal_type(raw: &str) -> GoalType {
    match raw {
        "code_generate" => GoalType::CodeGenerate,
        "code_review" => GoalType::CodeReview,
        "shell_command" => GoalType::ShellCommand,
        "research" => GoalType::Research,
        _ => GoalType::CodeEdit,
    }
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
