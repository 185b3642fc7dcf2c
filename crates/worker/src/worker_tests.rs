// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use cortex_approval::ApprovalService;
use cortex_backend::fake::FakeBackend;
use cortex_backend::{OutputEvent, Registry};
use cortex_core::{Agent, AgentStatus, ErrorCategory, FakeClock, Job, JobError, JobStatus};
use cortex_queue::MemQueue;
use cortex_sse::SseManager;
use cortex_storage::{MemStore, Store};

use super::*;

fn harness(
    script: Vec<OutputEvent>,
) -> (ExecutionWorker<FakeClock>, Arc<MemStore>, Arc<Registry>, FakeClock, Arc<FakeBackend>) {
    let clock = FakeClock::new();
    let store = Arc::new(MemStore::new());
    let queue = Arc::new(MemQueue::new());
    let sse = Arc::new(SseManager::new());
    let approvals = Arc::new(ApprovalService::new(store.clone(), queue.clone(), clock.clone()));
    let fake = Arc::new(FakeBackend::new("fake", script));
    let registry = Arc::new(Registry::builder().register("fake", fake.clone(), 4, 10, Duration::from_secs(60)).build());

    let worker = ExecutionWorker::new(
        store.clone(),
        registry.clone(),
        queue,
        sse,
        approvals,
        clock.clone(),
        WorkerConfig { cancel_probe_interval: Duration::from_millis(20), ..WorkerConfig::default() },
    );
    (worker, store, registry, clock, fake)
}

async fn seed(store: &MemStore, requires_approval: bool) -> (cortex_core::AgentId, cortex_core::JobId) {
    let now = chrono::Utc::now();
    let agent = Agent::new("demo", "demo", now).requires_approval(requires_approval);
    let agent_id = agent.id;
    store.create_agent(agent).await.unwrap();

    let mut job = Job::new(agent_id, serde_json::json!({"prompt": "hi"}), now);
    job.status = JobStatus::Scheduled;
    let job_id = job.id;
    store.create_job(job).await.unwrap();
    (agent_id, job_id)
}

#[tokio::test]
async fn completes_happy_path_job() {
    let (worker, store, _registry, _clock, fake) =
        harness(vec![OutputEvent::Text("hello".into()), OutputEvent::Completed(serde_json::json!({"ok": true}))]);
    let (_, job_id) = seed(&store, false).await;

    worker.agent_execute(job_id).await.unwrap();

    let job = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.result, Some(serde_json::json!({"ok": true})));
    assert_eq!(fake.calls().len(), 1);
}

#[tokio::test]
async fn redelivery_of_a_non_scheduled_job_is_a_no_op() {
    let (worker, store, _registry, _clock, _fake) = harness(vec![]);
    let (_, job_id) = seed(&store, false).await;

    // Move it out of Scheduled first so the next call observes a stale redelivery.
    store
        .cas_job_transition(job_id, JobStatus::Scheduled, JobStatus::Running, JobTransitionUpdate::default())
        .await
        .unwrap();
    let before = store.get_job(job_id).await.unwrap().unwrap();

    worker.agent_execute(job_id).await.unwrap();

    let after = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(before.status, after.status);
    assert_eq!(before.attempt, after.attempt);
}

#[tokio::test]
async fn opens_pre_execution_approval_gate_when_required() {
    let (worker, store, _registry, _clock, fake) = harness(vec![]);
    let (_, job_id) = seed(&store, true).await;

    worker.agent_execute(job_id).await.unwrap();

    let job = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::WaitingForApproval);
    assert!(job.approval_expires_at.is_some());
    assert!(fake.calls().is_empty(), "backend should never be dispatched to while gated");
}

#[tokio::test]
async fn missing_agent_fails_terminally_without_retry() {
    let (worker, store, _registry, _clock, _fake) = harness(vec![]);
    let now = chrono::Utc::now();
    let mut job = Job::new(cortex_core::AgentId::new(), serde_json::json!({}), now);
    job.status = JobStatus::Scheduled;
    let job_id = job.id;
    store.create_job(job).await.unwrap();

    worker.agent_execute(job_id).await.unwrap();

    let job = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error.as_ref().map(|e| e.category), Some(ErrorCategory::Permanent));
}

#[tokio::test]
async fn inactive_agent_fails_terminally() {
    let (worker, store, _registry, _clock, _fake) = harness(vec![]);
    let now = chrono::Utc::now();
    let mut agent = Agent::new("demo", "demo", now);
    agent.status = AgentStatus::Inactive;
    let agent_id = agent.id;
    store.create_agent(agent).await.unwrap();
    let mut job = Job::new(agent_id, serde_json::json!({}), now);
    job.status = JobStatus::Scheduled;
    let job_id = job.id;
    store.create_job(job).await.unwrap();

    worker.agent_execute(job_id).await.unwrap();

    let job = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
}

#[tokio::test]
async fn transient_failure_with_attempts_left_reschedules_the_job() {
    let (worker, store, _registry, _clock, _fake) = harness(vec![OutputEvent::Failed(JobError {
        category: ErrorCategory::Transient,
        message: "boom".into(),
    })]);
    let (_, job_id) = seed(&store, false).await;

    worker.agent_execute(job_id).await.unwrap();

    let job = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Scheduled, "retryable failure should re-arm the job for another attempt");
    assert_eq!(job.attempt, 1);
}

#[tokio::test]
async fn permanent_backend_failure_is_terminal() {
    let (worker, store, _registry, _clock, _fake) = harness(vec![OutputEvent::Failed(JobError {
        category: ErrorCategory::Permanent,
        message: "nope".into(),
    })]);
    let (_, job_id) = seed(&store, false).await;

    worker.agent_execute(job_id).await.unwrap();

    let job = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
}

#[tokio::test]
async fn timeout_category_maps_to_timed_out_status() {
    let (worker, store, _registry, _clock, _fake) = harness(vec![OutputEvent::Failed(JobError {
        category: ErrorCategory::Timeout,
        message: "too slow".into(),
    })]);
    let (_, job_id) = seed(&store, false).await;

    worker.agent_execute(job_id).await.unwrap();

    let job = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::TimedOut);
}

#[tokio::test]
async fn mid_stream_approval_required_opens_a_gate_and_cancels_the_handle() {
    let (worker, store, _registry, _clock, _fake) = harness(vec![OutputEvent::ApprovalRequired {
        action_type: "delete_repo".into(),
        summary: "delete the repo".into(),
        detail: serde_json::json!({}),
    }]);
    let (_, job_id) = seed(&store, false).await;

    worker.agent_execute(job_id).await.unwrap();

    let job = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::WaitingForApproval);
    let request = store.get_latest_approval_request_for_job(job_id).await.unwrap();
    assert!(request.is_some());
}
