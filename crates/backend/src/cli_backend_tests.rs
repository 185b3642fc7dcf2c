// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::backend::{Constraints, ExecutionContext, ExecutionTask, GoalType, Instruction};
use cortex_core::{AgentId, JobId};

fn task() -> ExecutionTask {
    ExecutionTask {
        job_id: JobId::new(),
        agent_id: AgentId::new(),
        instruction: Instruction {
            prompt: "do the thing".into(),
            goal_type: GoalType::ShellCommand,
            target_files: vec![],
            conversation_history: vec![],
        },
        context: ExecutionContext::default(),
        constraints: Constraints {
            timeout_ms: 5_000,
            max_tokens: None,
            model: None,
            allowed_tools: vec![],
            denied_tools: vec![],
            max_turns: None,
            network_access: false,
            shell_access: true,
        },
        checkpoint: None,
    }
}

#[tokio::test]
async fn successful_command_emits_completed() {
    let backend = CliBackend::new("echo", "bash").args(vec!["-c".into(), "echo hello".into()]);
    let mut handle = backend.execute(task()).await.unwrap();

    let mut saw_text = false;
    loop {
        match handle.recv().await {
            Some(OutputEvent::Text(line)) => {
                assert_eq!(line, "hello");
                saw_text = true;
            }
            Some(OutputEvent::Completed(_)) => break,
            Some(other) => panic!("unexpected event: {other:?}"),
            None => break,
        }
    }
    assert!(saw_text);
}

#[tokio::test]
async fn nonzero_exit_emits_failed_with_permanent_category() {
    let backend = CliBackend::new("fail", "bash").args(vec!["-c".into(), "exit 3".into()]);
    let mut handle = backend.execute(task()).await.unwrap();

    loop {
        match handle.recv().await {
            Some(OutputEvent::Failed(err)) => {
                assert_eq!(err.category, cortex_core::ErrorCategory::Permanent);
                return;
            }
            Some(_) => continue,
            None => panic!("channel closed without a terminal event"),
        }
    }
}

#[tokio::test]
async fn exceeding_timeout_emits_failed_with_timeout_category() {
    let backend = CliBackend::new("slow", "bash").args(vec!["-c".into(), "sleep 5".into()]);
    let mut slow_task = task();
    slow_task.constraints.timeout_ms = 50;
    let mut handle = backend.execute(slow_task).await.unwrap();

    loop {
        match handle.recv().await {
            Some(OutputEvent::Failed(err)) => {
                assert_eq!(err.category, cortex_core::ErrorCategory::Timeout);
                return;
            }
            Some(_) => continue,
            None => panic!("channel closed without a terminal event"),
        }
    }
}
