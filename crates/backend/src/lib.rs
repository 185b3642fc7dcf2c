// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cortex-backend: the execution-engine abstraction, its local/remote
//! implementations, and the breaker-guarded registry that routes jobs to
//! them.

pub mod backend;
pub mod breaker;
pub mod cli_backend;
pub mod handle;
pub mod http_backend;
pub mod registry;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use backend::{
    Backend, BackendError, BackendHealth, Capabilities, Constraints, ConversationTurn,
    ExecutionContext, ExecutionTask, GoalType, HealthStatus, Instruction, OutputEvent, TokenUsage,
};
pub use breaker::{BreakerState, CircuitBreaker};
pub use cli_backend::CliBackend;
pub use handle::{channel, Handle, HandleSender};
pub use http_backend::HttpBackend;
pub use registry::{BackendSnapshot, DispatchedHandle, Registry, RegistryBuilder};
