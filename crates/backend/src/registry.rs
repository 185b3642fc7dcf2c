// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of named backends, each guarded by its own circuit breaker and
//! a counting semaphore bounding in-flight concurrency — an executor
//! holding a concurrency-bearing adapter plus scheduler, the same "one
//! gate per backend" shape, generalized to many backends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::backend::{Backend, BackendError, Capabilities, ExecutionTask};
use crate::breaker::{BreakerState, CircuitBreaker};
use crate::handle::Handle;

struct Entry {
    backend: Arc<dyn Backend>,
    capabilities: Capabilities,
    breaker: CircuitBreaker,
    permits: Arc<Semaphore>,
}

pub struct Registry {
    entries: HashMap<String, Entry>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder { entries: HashMap::new() }
    }

    /// Acquire a permit and dispatch `task` to `backend_name`.
    ///
    /// Returns `BackendError::Unavailable` without touching the backend if
    /// its breaker is open. On success, records the outcome against the
    /// breaker only once the returned handle's terminal event is observed
    /// by the caller (see `cortex-worker`); `dispatch` itself only accounts
    /// for dispatch-time failures (breaker open, semaphore closed, spawn
    /// rejected by the backend).
    pub async fn dispatch(&self, backend_name: &str, task: ExecutionTask) -> Result<DispatchedHandle, BackendError> {
        let entry = self
            .entries
            .get(backend_name)
            .ok_or_else(|| BackendError::Permanent(format!("unknown backend {backend_name}")))?;

        if !entry.breaker.allow() {
            return Err(BackendError::Unavailable(format!("{backend_name} breaker is open")));
        }

        let permit = entry
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BackendError::Unavailable(format!("{backend_name} permit pool closed")))?;

        match entry.backend.execute(task).await {
            Ok(handle) => Ok(DispatchedHandle { handle, _permit: permit }),
            Err(e) => {
                if e.category().counts_toward_breaker() {
                    entry.breaker.record_failure();
                }
                Err(e)
            }
        }
    }

    /// Choose a backend for `task`. `preferred` wins outright if its breaker
    /// isn't OPEN and it supports `task.instruction.goal_type`. Otherwise
    /// scan every registered backend in a deterministic (name-sorted) order:
    /// CLOSED and goal-supporting first, HALF_OPEN next, never OPEN. `None`
    /// means no backend currently qualifies.
    pub fn route_task(&self, task: &ExecutionTask, preferred: Option<&str>) -> Option<String> {
        let goal = task.instruction.goal_type;
        if let Some(preferred) = preferred {
            if let Some(entry) = self.entries.get(preferred) {
                if entry.breaker.state() != BreakerState::Open && entry.capabilities.supports(goal) {
                    return Some(preferred.to_string());
                }
            }
        }

        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();

        let closed = names.iter().find(|name| {
            let entry = &self.entries[**name];
            entry.breaker.state() == BreakerState::Closed && entry.capabilities.supports(goal)
        });
        if let Some(name) = closed {
            return Some((*name).clone());
        }

        names
            .into_iter()
            .find(|name| {
                let entry = &self.entries[**name];
                entry.breaker.state() == BreakerState::HalfOpen && entry.capabilities.supports(goal)
            })
            .cloned()
    }

    pub fn record_outcome(&self, backend_name: &str, succeeded: bool) {
        if let Some(entry) = self.entries.get(backend_name) {
            if succeeded {
                entry.breaker.record_success();
            } else {
                entry.breaker.record_failure();
            }
        }
    }

    pub fn breaker_state(&self, backend_name: &str) -> Option<crate::breaker::BreakerState> {
        self.entries.get(backend_name).map(|e| e.breaker.state())
    }

    pub fn backend_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// A point-in-time read of every registered backend's breaker state,
    /// for the `/health/backends` surface.
    pub fn snapshot(&self) -> Vec<BackendSnapshot> {
        self.entries
            .iter()
            .map(|(name, entry)| BackendSnapshot {
                name: name.clone(),
                state: entry.breaker.state(),
                window_failure_count: entry.breaker.window_failure_count(),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct BackendSnapshot {
    pub name: String,
    pub state: crate::breaker::BreakerState,
    pub window_failure_count: usize,
}

/// A handle paired with the concurrency permit that must stay alive for as
/// long as the task is in flight.
pub struct DispatchedHandle {
    pub handle: Handle,
    _permit: OwnedSemaphorePermit,
}

pub struct RegistryBuilder {
    entries: HashMap<String, Entry>,
}

impl RegistryBuilder {
    pub fn register(
        mut self,
        name: impl Into<String>,
        backend: Arc<dyn Backend>,
        max_concurrent: usize,
        failure_threshold: usize,
        open_duration: Duration,
    ) -> Self {
        let name = name.into();
        let capabilities = backend.capabilities();
        self.entries.insert(
            name,
            Entry {
                backend,
                capabilities,
                breaker: CircuitBreaker::new(failure_threshold, open_duration),
                permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            },
        );
        self
    }

    pub fn build(self) -> Registry {
        Registry { entries: self.entries }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
