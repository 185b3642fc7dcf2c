// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::backend::{Constraints, ExecutionContext, ExecutionTask, GoalType, Instruction, OutputEvent};
use crate::fake::FakeBackend;
use crate::handle::Handle;
use cortex_core::{AgentId, JobId};
use std::sync::Arc;
use std::time::Duration;

fn task() -> ExecutionTask {
    ExecutionTask {
        job_id: JobId::new(),
        agent_id: AgentId::new(),
        instruction: Instruction {
            prompt: "do the thing".into(),
            goal_type: GoalType::CodeEdit,
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
            shell_access: false,
        },
        checkpoint: None,
    }
}

#[tokio::test]
async fn dispatch_routes_to_the_named_backend() {
    let fake = Arc::new(FakeBackend::new("fake", vec![OutputEvent::Completed(serde_json::json!({}))]));
    let registry = Registry::builder().register("fake", fake.clone(), 2, 3, Duration::from_secs(30)).build();

    let dispatched = registry.dispatch("fake", task()).await.unwrap();
    drop(dispatched);
    assert_eq!(fake.calls().len(), 1);
}

#[tokio::test]
async fn dispatch_rejects_unknown_backend() {
    let registry = Registry::builder().build();
    let err = registry.dispatch("nope", task()).await.unwrap_err();
    assert!(matches!(err, BackendError::Permanent(_)));
}

#[tokio::test]
async fn open_breaker_rejects_dispatch_without_touching_backend() {
    let fake = Arc::new(FakeBackend::new("fake", vec![]));
    let registry = Registry::builder().register("fake", fake.clone(), 2, 1, Duration::from_secs(60)).build();
    registry.record_outcome("fake", false);
    assert_eq!(registry.breaker_state("fake"), Some(BreakerState::Open));

    let err = registry.dispatch("fake", task()).await.unwrap_err();
    assert!(matches!(err, BackendError::Unavailable(_)));
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn snapshot_reports_each_backend_breaker_state() {
    let fake = Arc::new(FakeBackend::new("fake", vec![]));
    let registry = Registry::builder().register("fake", fake, 2, 1, Duration::from_secs(60)).build();
    registry.record_outcome("fake", false);

    let snapshot = registry.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].name, "fake");
    assert_eq!(snapshot[0].state, BreakerState::Open);
    assert_eq!(snapshot[0].window_failure_count, 1);
}

#[tokio::test]
async fn concurrency_is_bounded_by_permits() {
    let fake = Arc::new(FakeBackend::new("fake", vec![]));
    let registry = Registry::builder().register("fake", fake, 1, 5, Duration::from_secs(60)).build();

    let first = registry.dispatch("fake", task()).await.unwrap();
    let second = tokio::time::timeout(Duration::from_millis(50), registry.dispatch("fake", task())).await;
    assert!(second.is_err(), "second dispatch should block while the one permit is held");
    drop(first);
}

#[tokio::test]
async fn route_task_skips_a_backend_that_does_not_support_the_goal_type() {
    let shell_only = Arc::new(GoalLimitedBackend::new("shell-only", vec![GoalType::ShellCommand]));
    let code_editor = Arc::new(GoalLimitedBackend::new("code-editor", vec![GoalType::CodeEdit]));
    let registry = Registry::builder()
        .register("shell-only", shell_only, 2, 3, Duration::from_secs(30))
        .register("code-editor", code_editor, 2, 3, Duration::from_secs(30))
        .build();

    let chosen = registry.route_task(&task(), None);
    assert_eq!(chosen.as_deref(), Some("code-editor"));
}

#[tokio::test]
async fn route_task_prefers_the_requested_backend_when_eligible() {
    let a = Arc::new(GoalLimitedBackend::new("a", vec![GoalType::CodeEdit]));
    let b = Arc::new(GoalLimitedBackend::new("b", vec![GoalType::CodeEdit]));
    let registry = Registry::builder()
        .register("a", a, 2, 3, Duration::from_secs(30))
        .register("b", b, 2, 3, Duration::from_secs(30))
        .build();

    assert_eq!(registry.route_task(&task(), Some("b")).as_deref(), Some("b"));
}

#[tokio::test]
async fn route_task_ignores_a_preferred_backend_whose_breaker_is_open() {
    let preferred = Arc::new(GoalLimitedBackend::new("preferred", vec![GoalType::CodeEdit]));
    let fallback = Arc::new(GoalLimitedBackend::new("fallback", vec![GoalType::CodeEdit]));
    let registry = Registry::builder()
        .register("preferred", preferred, 2, 1, Duration::from_secs(60))
        .register("fallback", fallback, 2, 1, Duration::from_secs(60))
        .build();
    registry.record_outcome("preferred", false);

    assert_eq!(registry.route_task(&task(), Some("preferred")).as_deref(), Some("fallback"));
}

/// A fake backend whose `capabilities()` only advertises a fixed set of
/// goal types, for exercising the router's capability filter.
struct GoalLimitedBackend {
    name: String,
    goals: Vec<GoalType>,
}

impl GoalLimitedBackend {
    fn new(name: impl Into<String>, goals: Vec<GoalType>) -> Self {
        Self { name: name.into(), goals }
    }
}

#[async_trait::async_trait]
impl Backend for GoalLimitedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> crate::backend::Capabilities {
        crate::backend::Capabilities {
            streaming: true,
            file_edit: true,
            shell: true,
            token_usage: false,
            cancellation: true,
            supported_goals: self.goals.clone(),
            max_context_tokens: 100_000,
        }
    }

    async fn execute(&self, _task: ExecutionTask) -> Result<Handle, BackendError> {
        let (_sender, handle) = crate::handle::channel(1);
        Ok(handle)
    }
}
