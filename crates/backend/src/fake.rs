// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable in-memory backend for tests, mirroring the `FakeAgentAdapter`
//! pattern: a hand-rolled double behind the same trait as the real thing,
//! driven by a pre-scripted event list rather than mock expectations.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::backend::{Backend, BackendError, Capabilities, ExecutionTask, GoalType, OutputEvent};
use crate::handle::{channel, Handle};

pub struct FakeBackend {
    name: String,
    script: Mutex<Vec<OutputEvent>>,
    calls: Mutex<Vec<ExecutionTask>>,
}

impl FakeBackend {
    pub fn new(name: impl Into<String>, script: Vec<OutputEvent>) -> Self {
        Self { name: name.into(), script: Mutex::new(script), calls: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> Vec<ExecutionTask> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            streaming: true,
            file_edit: true,
            shell: true,
            token_usage: true,
            cancellation: true,
            supported_goals: vec![
                GoalType::CodeEdit,
                GoalType::CodeGenerate,
                GoalType::CodeReview,
                GoalType::ShellCommand,
                GoalType::Research,
            ],
            max_context_tokens: 200_000,
        }
    }

    async fn execute(&self, task: ExecutionTask) -> Result<Handle, BackendError> {
        self.calls.lock().push(task);
        let (sender, handle) = channel(16);
        let events = self.script.lock().clone();
        tokio::spawn(async move {
            for event in events {
                if sender.events.send(event).await.is_err() {
                    break;
                }
            }
        });
        Ok(handle)
    }
}
