// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-backend circuit breaker. CLOSED lets traffic through and counts
//! recent outcomes; once `failure_threshold` failures land inside the
//! tracked window the breaker trips OPEN and rejects calls until
//! `open_duration` has elapsed, then allows a single HALF_OPEN probe to
//! decide whether to close again or re-open.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: BreakerState,
    /// Ring buffer of recent outcomes, `true` = failure. Bounded to
    /// `failure_threshold` entries — the window length equals the trip
    /// threshold itself.
    outcomes: VecDeque<bool>,
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    failure_threshold: usize,
    open_duration: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: usize, open_duration: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            open_duration,
            inner: Mutex::new(Inner { state: BreakerState::Closed, outcomes: VecDeque::new(), opened_at: None }),
        }
    }

    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock();
        self.maybe_transition_to_half_open(&mut inner);
        inner.state
    }

    /// Failures currently counted inside the tracked window.
    pub fn window_failure_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.outcomes.iter().filter(|f| **f).count()
    }

    fn maybe_transition_to_half_open(&self, inner: &mut Inner) {
        if inner.state == BreakerState::Open {
            if let Some(opened_at) = inner.opened_at {
                if opened_at.elapsed() >= self.open_duration {
                    inner.state = BreakerState::HalfOpen;
                }
            }
        }
    }

    /// Whether a call should be allowed right now. Always transitions OPEN
    /// to HALF_OPEN first if the open duration has elapsed, so the caller
    /// sees a consistent `state()`/`allow()` pair.
    pub fn allow(&self) -> bool {
        let mut inner = self.inner.lock();
        self.maybe_transition_to_half_open(&mut inner);
        !matches!(inner.state, BreakerState::Open)
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.outcomes.push_back(false);
        if inner.outcomes.len() > self.failure_threshold {
            inner.outcomes.pop_front();
        }
        inner.state = BreakerState::Closed;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        if inner.state == BreakerState::HalfOpen {
            inner.state = BreakerState::Open;
            inner.opened_at = Some(Instant::now());
            inner.outcomes.clear();
            return;
        }
        inner.outcomes.push_back(true);
        if inner.outcomes.len() > self.failure_threshold {
            inner.outcomes.pop_front();
        }
        let failures = inner.outcomes.iter().filter(|f| **f).count();
        if failures >= self.failure_threshold {
            inner.state = BreakerState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }
}

#[cfg(test)]
#[path = "breaker_tests.rs"]
mod tests;
