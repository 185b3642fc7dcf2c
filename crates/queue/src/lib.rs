// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cortex-queue: the durable task queue adapter — `Queue` is the contract
//! `cortex-worker`'s pool polls; `PgQueue` backs it with Postgres
//! `SELECT ... FOR UPDATE SKIP LOCKED`, `MemQueue` is an in-process double.

pub mod backoff;
pub mod mem;
pub mod pg;
pub mod queue;

pub use backoff::calculate_backoff;
pub use mem::MemQueue;
pub use pg::PgQueue;
pub use queue::{AddJobOptions, ClaimedTask, Queue, QueueError};
