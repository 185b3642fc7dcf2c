// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use cortex_approval::ApprovalService;
use cortex_backend::fake::FakeBackend;
use cortex_backend::{OutputEvent, Registry};
use cortex_core::{Agent, FakeClock, Job, JobStatus};
use cortex_queue::{AddJobOptions, MemQueue, Queue};
use cortex_sse::SseManager;
use cortex_storage::{MemStore, Store};

use super::*;
use crate::worker::{ExecutionWorker, WorkerConfig};

#[tokio::test]
async fn claims_and_executes_a_scheduled_job() {
    let clock = FakeClock::new();
    let store = Arc::new(MemStore::new());
    let queue = Arc::new(MemQueue::new());
    let sse = Arc::new(SseManager::new());
    let approvals = Arc::new(ApprovalService::new(store.clone(), queue.clone(), clock.clone()));
    let fake = Arc::new(FakeBackend::new("fake", vec![OutputEvent::Completed(serde_json::json!({}))]));
    let registry = Arc::new(Registry::builder().register("fake", fake.clone(), 4, 10, Duration::from_secs(60)).build());

    let now = chrono::Utc::now();
    let agent = Agent::new("demo", "demo", now);
    let agent_id = agent.id;
    store.create_agent(agent).await.unwrap();
    let mut job = Job::new(agent_id, serde_json::json!({"prompt": "hi"}), now);
    job.status = JobStatus::Scheduled;
    let job_id = job.id;
    store.create_job(job).await.unwrap();
    queue
        .add_job(
            TASK_NAME,
            serde_json::json!({"jobId": job_id}),
            AddJobOptions::default(),
        )
        .await
        .unwrap();

    let worker = Arc::new(ExecutionWorker::new(
        store.clone(),
        registry,
        queue.clone(),
        sse,
        approvals,
        clock.clone(),
        WorkerConfig::default(),
    ));
    let pool = Arc::new(WorkerPool::new(
        worker,
        queue,
        clock,
        PoolConfig { concurrency: 1, idle_poll_interval: Duration::from_millis(10) },
    ));
    let handles = pool.spawn();

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    loop {
        let job = store.get_job(job_id).await.unwrap().unwrap();
        if job.status == JobStatus::Completed {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "job never completed");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    for handle in handles {
        handle.abort();
    }
    assert_eq!(fake.calls().len(), 1);
}
