// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use cortex_approval::{ApprovalService, NewRequest};
use cortex_core::{Agent, FakeClock, Job, JobStatus, RiskLevel};
use cortex_queue::MemQueue;
use cortex_storage::{MemStore, Store};

use super::*;

fn harness() -> (Reaper<FakeClock>, Arc<MemStore>, FakeClock) {
    let clock = FakeClock::new();
    let store = Arc::new(MemStore::new());
    let queue = Arc::new(MemQueue::new());
    let approvals = Arc::new(ApprovalService::new(store.clone(), queue.clone(), clock.clone()));
    let reaper = Reaper::new(
        store.clone(),
        queue,
        approvals,
        clock.clone(),
        ReaperConfig { poll_interval: Duration::from_secs(60), reap_after: Duration::from_secs(90) },
    );
    (reaper, store, clock)
}

#[tokio::test]
async fn reaps_a_job_whose_heartbeat_went_silent() {
    let (reaper, store, clock) = harness();
    clock.set_utc(chrono::Utc::now());

    let agent = Agent::new("demo", "demo", clock.utc_now());
    let agent_id = agent.id;
    store.create_agent(agent).await.unwrap();

    let mut job = Job::new(agent_id, serde_json::json!({}), clock.utc_now());
    job.status = JobStatus::Running;
    job.heartbeat_at = Some(clock.utc_now());
    job.max_attempts = 3;
    let job_id = job.id;
    store.create_job(job).await.unwrap();

    clock.advance(Duration::from_secs(120));

    let reaped = reaper.reap_dead_jobs().await.unwrap();
    assert_eq!(reaped, 1);

    let job = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Scheduled, "retryable heartbeat loss should reschedule the job");
    assert_eq!(job.attempt, 0, "the reaper does not itself count as an execution attempt");
}

#[tokio::test]
async fn leaves_a_healthy_job_alone() {
    let (reaper, store, clock) = harness();
    let agent = Agent::new("demo", "demo", clock.utc_now());
    let agent_id = agent.id;
    store.create_agent(agent).await.unwrap();

    let mut job = Job::new(agent_id, serde_json::json!({}), clock.utc_now());
    job.status = JobStatus::Running;
    job.heartbeat_at = Some(clock.utc_now());
    let job_id = job.id;
    store.create_job(job).await.unwrap();

    let reaped = reaper.reap_dead_jobs().await.unwrap();
    assert_eq!(reaped, 0);
    let job = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Running);
}

#[tokio::test]
async fn exhausted_attempts_are_reaped_without_a_reschedule() {
    let (reaper, store, clock) = harness();
    let agent = Agent::new("demo", "demo", clock.utc_now());
    let agent_id = agent.id;
    store.create_agent(agent).await.unwrap();

    let mut job = Job::new(agent_id, serde_json::json!({}), clock.utc_now());
    job.status = JobStatus::Running;
    job.heartbeat_at = Some(clock.utc_now());
    job.attempt = job.max_attempts;
    let job_id = job.id;
    store.create_job(job).await.unwrap();

    clock.advance(Duration::from_secs(120));

    let reaped = reaper.reap_dead_jobs().await.unwrap();
    assert_eq!(reaped, 1);

    let job = store.get_job(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed, "attempts exhausted — stays Failed, no reschedule");
}

#[tokio::test]
async fn expires_a_stale_pending_approval_request() {
    let (reaper, store, clock) = harness();
    let agent = Agent::new("demo", "demo", clock.utc_now());
    let agent_id = agent.id;
    store.create_agent(agent).await.unwrap();
    let mut job = Job::new(agent_id, serde_json::json!({}), clock.utc_now());
    job.status = JobStatus::WaitingForApproval;
    let job_id = job.id;
    store.create_job(job).await.unwrap();

    let approvals = ApprovalService::new(store.clone(), Arc::new(MemQueue::new()), clock.clone());
    approvals
        .create_request(NewRequest {
            job_id,
            action_type: "deploy".into(),
            action_summary: "deploy it".into(),
            action_detail: serde_json::json!({}),
            risk_level: RiskLevel::P1,
            resume_payload: None,
            blast_radius: None,
            notification_channels: serde_json::json!([]),
            approver_user_account_id: None,
            ttl_override: Some(chrono::Duration::seconds(30)),
        })
        .await
        .unwrap();

    clock.advance(Duration::from_secs(60));

    let expired = reaper.expire_stale_approvals().await.unwrap();
    assert_eq!(expired, 1);
}
