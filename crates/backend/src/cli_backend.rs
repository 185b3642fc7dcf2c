// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local subprocess backend: spawns an allowlisted CLI command, streams its
//! stdout line-by-line as `OutputEvent::Text`, and interprets its exit
//! status as completion or failure. Grounded on the shell-step execution
//! idiom (wrapped `bash -c`, explicit env, timeout-bounded run).

use std::collections::HashMap;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::backend::{Backend, BackendError, Capabilities, ExecutionTask, GoalType, OutputEvent};
use crate::handle::{channel, Handle};

/// Variables carried over from the parent process's environment; everything
/// else is cleared before spawning so a job's subprocess never inherits the
/// daemon's own credentials. Task-scoped secrets still reach the child via
/// `CliBackend::env`.
const INHERITED_ENV: &[&str] = &["PATH", "HOME", "LANG", "TERM", "TMPDIR"];

/// What gets written to the child's stdin: the instruction and context
/// flattened to JSON, since a subprocess backend has no other channel to
/// receive them over.
fn cli_input(task: &ExecutionTask) -> serde_json::Value {
    serde_json::json!({
        "jobId": task.job_id.to_string(),
        "agentId": task.agent_id.to_string(),
        "prompt": task.instruction.prompt,
        "targetFiles": task.instruction.target_files,
        "workspacePath": task.context.workspace_path,
        "systemPrompt": task.context.system_prompt,
        "relevantFiles": task.context.relevant_files,
        "checkpoint": task.checkpoint,
    })
}

pub struct CliBackend {
    name: String,
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl CliBackend {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self { name: name.into(), command: command.into(), args: Vec::new(), env: HashMap::new() }
    }

    cortex_core::setters! {
        set {
            args: Vec<String>,
            env: HashMap<String, String>,
        }
    }
}

#[async_trait]
impl Backend for CliBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            streaming: true,
            file_edit: true,
            shell: true,
            token_usage: false,
            cancellation: true,
            supported_goals: vec![
                GoalType::CodeEdit,
                GoalType::CodeGenerate,
                GoalType::CodeReview,
                GoalType::ShellCommand,
            ],
            max_context_tokens: 200_000,
        }
    }

    async fn execute(&self, task: ExecutionTask) -> Result<Handle, BackendError> {
        let (sender, handle) = channel(64);
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args).env_clear();
        for key in INHERITED_ENV {
            if let Ok(value) = std::env::var(key) {
                cmd.env(key, value);
            }
        }
        cmd.envs(&self.env)
            .envs(&task.context.environment)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let input = serde_json::to_string(&cli_input(&task)).unwrap_or_default();
        let timeout = task.constraints.timeout();
        let cancel = sender.cancel.clone();

        tokio::spawn(async move {
            let mut child = match cmd.spawn() {
                Ok(child) => child,
                Err(e) => {
                    let _ = sender
                        .events
                        .send(OutputEvent::Failed(cortex_core::JobError {
                            category: cortex_core::ErrorCategory::Transient,
                            message: format!("spawn failed: {e}"),
                        }))
                        .await;
                    return;
                }
            };

            if let Some(mut stdin) = child.stdin.take() {
                use tokio::io::AsyncWriteExt;
                let _ = stdin.write_all(input.as_bytes()).await;
            }

            let Some(stdout) = child.stdout.take() else {
                let _ = sender
                    .events
                    .send(OutputEvent::Failed(cortex_core::JobError {
                        category: cortex_core::ErrorCategory::Transient,
                        message: "child stdout pipe unavailable".into(),
                    }))
                    .await;
                return;
            };
            let mut lines = BufReader::new(stdout).lines();

            let run = async {
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            let _ = child.kill().await;
                            break;
                        }
                        line = lines.next_line() => {
                            match line {
                                Ok(Some(line)) => {
                                    if sender.events.send(OutputEvent::Text(line)).await.is_err() {
                                        let _ = child.kill().await;
                                        break;
                                    }
                                }
                                Ok(None) => break,
                                Err(_) => break,
                            }
                        }
                    }
                }
            };

            let outcome = tokio::time::timeout(timeout, run).await;
            if outcome.is_err() {
                let _ = child.kill().await;
                let _ = sender
                    .events
                    .send(OutputEvent::Failed(cortex_core::JobError {
                        category: cortex_core::ErrorCategory::Timeout,
                        message: format!("command exceeded {timeout:?}"),
                    }))
                    .await;
                return;
            }

            match child.wait().await {
                Ok(status) if status.success() => {
                    let _ = sender.events.send(OutputEvent::Completed(serde_json::json!({}))).await;
                }
                Ok(status) => {
                    let _ = sender
                        .events
                        .send(OutputEvent::Failed(cortex_core::JobError {
                            category: cortex_core::ErrorCategory::Permanent,
                            message: format!("exited with {status}"),
                        }))
                        .await;
                }
                Err(e) => {
                    let _ = sender
                        .events
                        .send(OutputEvent::Failed(cortex_core::JobError {
                            category: cortex_core::ErrorCategory::Transient,
                            message: format!("wait failed: {e}"),
                        }))
                        .await;
                }
            }
        });

        Ok(handle)
    }
}

#[cfg(test)]
#[path = "cli_backend_tests.rs"]
mod tests;
