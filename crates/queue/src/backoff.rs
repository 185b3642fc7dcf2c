// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry backoff curve shared by every `Queue` implementation: base 1s,
//! factor 2, capped at 5 minutes, full jitter.

use std::time::Duration;

const BASE: Duration = Duration::from_secs(1);
const CAP: Duration = Duration::from_secs(300);
const FACTOR: u32 = 2;

/// `attempt` is 1-based (the attempt number that just failed). Returns a
/// duration sampled uniformly from `[0, min(cap, base * factor^attempt))`.
pub fn calculate_backoff(attempt: i32) -> Duration {
    calculate_backoff_with(attempt, rand::random::<f64>())
}

/// Same curve, with the jitter sample injected for deterministic tests.
pub fn calculate_backoff_with(attempt: i32, jitter: f64) -> Duration {
    let exponent = attempt.max(0) as u32;
    let factor = FACTOR.saturating_pow(exponent);
    let uncapped = BASE.saturating_mul(factor);
    let bounded = uncapped.min(CAP);
    bounded.mul_f64(jitter.clamp(0.0, 1.0))
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
