// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote HTTP backend: posts a task to a vendor LLM API and relays its
//! streamed response body (newline-delimited JSON frames) as `OutputEvent`s.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use std::time::Duration;

use crate::backend::{Backend, BackendError, Capabilities, ExecutionTask, GoalType, OutputEvent, TokenUsage};
use crate::handle::{channel, Handle};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Frame {
    Text { content: String },
    ToolUse { tool_name: String, tool_input: serde_json::Value },
    ToolResult { tool_name: String, output: serde_json::Value, is_error: bool },
    Usage { token_usage: FrameTokenUsage },
    Checkpoint { state: serde_json::Value },
    ApprovalRequired { action_type: String, summary: String, detail: serde_json::Value },
    Completed { result: serde_json::Value },
    Failed { category: cortex_core::ErrorCategory, message: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FrameTokenUsage {
    input_tokens: u64,
    output_tokens: u64,
    #[serde(default)]
    cost_usd: f64,
    #[serde(default)]
    cache_read_tokens: u64,
    #[serde(default)]
    cache_creation_tokens: u64,
}

pub struct HttpBackend {
    name: String,
    endpoint: String,
    client: reqwest::Client,
    connect_timeout: Duration,
}

impl HttpBackend {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BackendError::SpawnFailed(e.to_string()))?;
        Ok(Self { name: name.into(), endpoint: endpoint.into(), client, connect_timeout: Duration::from_secs(10) })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            streaming: true,
            file_edit: true,
            shell: false,
            token_usage: true,
            cancellation: true,
            supported_goals: vec![GoalType::CodeEdit, GoalType::CodeGenerate, GoalType::CodeReview, GoalType::Research],
            max_context_tokens: 200_000,
        }
    }

    async fn execute(&self, task: ExecutionTask) -> Result<Handle, BackendError> {
        let (sender, handle) = channel(64);
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let body = serde_json::json!({
            "job_id": task.job_id.to_string(),
            "agent_id": task.agent_id.to_string(),
            "instruction": {
                "prompt": task.instruction.prompt,
                "target_files": task.instruction.target_files,
            },
            "context": {
                "workspace_path": task.context.workspace_path,
                "system_prompt": task.context.system_prompt,
                "memories": task.context.memories,
                "relevant_files": task.context.relevant_files,
                "skill_instructions": task.context.skill_instructions,
            },
            "constraints": {
                "timeout_ms": task.constraints.timeout_ms,
                "max_tokens": task.constraints.max_tokens,
                "model": task.constraints.model,
                "allowed_tools": task.constraints.allowed_tools,
                "denied_tools": task.constraints.denied_tools,
                "max_turns": task.constraints.max_turns,
                "network_access": task.constraints.network_access,
                "shell_access": task.constraints.shell_access,
            },
            "checkpoint": task.checkpoint,
        });
        let cancel = sender.cancel.clone();

        let response = client
            .post(&endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(if status.is_server_error() {
                BackendError::Transient(format!("upstream returned {status}"))
            } else {
                BackendError::Permanent(format!("upstream returned {status}"))
            });
        }

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buf = Vec::new();
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    chunk = stream.next() => {
                        let Some(chunk) = chunk else { break };
                        let Ok(chunk) = chunk else { break };
                        buf.extend_from_slice(&chunk);
                        while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                            let line: Vec<u8> = buf.drain(..=pos).collect();
                            let line = &line[..line.len().saturating_sub(1)];
                            if line.is_empty() {
                                continue;
                            }
                            let Ok(frame) = serde_json::from_slice::<Frame>(line) else { continue };
                            let event = match frame {
                                Frame::Text { content } => OutputEvent::Text(content),
                                Frame::ToolUse { tool_name, tool_input } => {
                                    OutputEvent::ToolUse { tool_name, tool_input }
                                }
                                Frame::ToolResult { tool_name, output, is_error } => {
                                    OutputEvent::ToolResult { tool_name, output, is_error }
                                }
                                Frame::Usage { token_usage } => OutputEvent::Usage(TokenUsage {
                                    input_tokens: token_usage.input_tokens,
                                    output_tokens: token_usage.output_tokens,
                                    cost_usd: token_usage.cost_usd,
                                    cache_read_tokens: token_usage.cache_read_tokens,
                                    cache_creation_tokens: token_usage.cache_creation_tokens,
                                }),
                                Frame::Checkpoint { state } => OutputEvent::Checkpoint(state),
                                Frame::ApprovalRequired { action_type, summary, detail } => {
                                    OutputEvent::ApprovalRequired { action_type, summary, detail }
                                }
                                Frame::Completed { result } => OutputEvent::Completed(result),
                                Frame::Failed { category, message } => {
                                    OutputEvent::Failed(cortex_core::JobError { category, message })
                                }
                            };
                            if sender.events.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        });

        Ok(handle)
    }
}

fn classify_reqwest_error(e: &reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::TimedOut(Duration::from_secs(0))
    } else if e.is_connect() {
        BackendError::Unavailable(e.to_string())
    } else {
        BackendError::Transient(e.to_string())
    }
}

#[cfg(test)]
#[path = "http_backend_tests.rs"]
mod tests;
