// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cortex_core::{Agent, Job, JobStatus};

fn now() -> DateTime<Utc> {
    Utc::now()
}

#[tokio::test]
async fn job_round_trips() {
    let store = MemStore::new();
    let agent = Agent::new("echo".into(), "echo".into(), now());
    store.create_agent(agent.clone()).await.unwrap();

    let job = Job::new(agent.id, serde_json::json!({"n": 1}), now());
    store.create_job(job.clone()).await.unwrap();

    let loaded = store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, JobStatus::Pending);
}

#[tokio::test]
async fn cas_transition_rejects_stale_expected_status() {
    let store = MemStore::new();
    let agent = Agent::new("echo".into(), "echo".into(), now());
    store.create_agent(agent.clone()).await.unwrap();
    let mut job = Job::new(agent.id, serde_json::json!({}), now());
    job.status = JobStatus::Running;
    store.create_job(job.clone()).await.unwrap();

    // Someone already moved it past Scheduled; a stale CAS from Scheduled must fail.
    let result = store
        .cas_job_transition(job.id, JobStatus::Scheduled, JobStatus::Running, JobTransitionUpdate::default())
        .await
        .unwrap();
    assert!(result.is_none());

    let ok = store
        .cas_job_transition(
            job.id,
            JobStatus::Running,
            JobStatus::Completed,
            JobTransitionUpdate { completed_at: Some(now()), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(ok.unwrap().status, JobStatus::Completed);
}

#[tokio::test]
async fn concurrent_cas_only_one_winner() {
    use std::sync::Arc;
    let store = Arc::new(MemStore::new());
    let agent = Agent::new("echo".into(), "echo".into(), now());
    store.create_agent(agent.clone()).await.unwrap();
    let mut job = Job::new(agent.id, serde_json::json!({}), now());
    job.status = JobStatus::Running;
    store.create_job(job.clone()).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let id = job.id;
        handles.push(tokio::spawn(async move {
            store
                .cas_job_transition(
                    id,
                    JobStatus::Running,
                    JobStatus::Failed,
                    JobTransitionUpdate::default(),
                )
                .await
                .unwrap()
        }));
    }
    let mut wins = 0;
    for h in handles {
        if h.await.unwrap().is_some() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);
}

#[tokio::test]
async fn approval_decide_is_single_use() {
    use cortex_core::{ApprovalRequest, ApprovalStatus, RiskLevel};

    let store = MemStore::new();
    let request = ApprovalRequest {
        id: Default::default(),
        job_id: Default::default(),
        action_type: "send_email".into(),
        action_summary: "send".into(),
        action_detail: serde_json::json!({}),
        token_hash: "deadbeef".into(),
        status: ApprovalStatus::Pending,
        requested_at: now(),
        decided_at: None,
        decided_by: None,
        expires_at: now() + chrono::Duration::hours(1),
        risk_level: RiskLevel::P1,
        resume_payload: None,
        blast_radius: None,
        notification_channels: serde_json::json!([]),
        decision_note: None,
        approver_user_account_id: None,
    };
    store.create_approval_request(request.clone()).await.unwrap();

    let first = store
        .cas_approval_decide(request.id, ApprovalStatus::Approved, now(), Some("alice".into()), None)
        .await
        .unwrap();
    assert!(first.is_some());

    let second = store
        .cas_approval_decide(request.id, ApprovalStatus::Rejected, now(), Some("bob".into()), None)
        .await
        .unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn latest_approval_request_for_job_picks_the_most_recent() {
    use cortex_core::{ApprovalRequest, ApprovalStatus, JobId, RiskLevel};

    let store = MemStore::new();
    let job_id = JobId::new();
    let make = |requested_at: DateTime<Utc>| ApprovalRequest {
        id: Default::default(),
        job_id,
        action_type: "send_email".into(),
        action_summary: "send".into(),
        action_detail: serde_json::json!({}),
        token_hash: uuid::Uuid::new_v4().to_string(),
        status: ApprovalStatus::Pending,
        requested_at,
        decided_at: None,
        decided_by: None,
        expires_at: requested_at + chrono::Duration::hours(1),
        risk_level: RiskLevel::P1,
        resume_payload: None,
        blast_radius: None,
        notification_channels: serde_json::json!([]),
        decision_note: None,
        approver_user_account_id: None,
    };

    let older = make(now() - chrono::Duration::hours(2));
    let newer = make(now());
    store.create_approval_request(older).await.unwrap();
    store.create_approval_request(newer.clone()).await.unwrap();

    let latest = store.get_latest_approval_request_for_job(job_id).await.unwrap().unwrap();
    assert_eq!(latest.id, newer.id);
}
