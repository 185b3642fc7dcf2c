// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
fn full_jitter_never_exceeds_the_uncapped_curve() {
    let full = calculate_backoff_with(3, 1.0);
    assert_eq!(full, Duration::from_secs(8));
}

#[test]
fn zero_jitter_means_zero_delay() {
    assert_eq!(calculate_backoff_with(5, 0.0), Duration::ZERO);
}

#[test]
fn curve_is_capped_at_five_minutes() {
    let at_cap = calculate_backoff_with(20, 1.0);
    assert_eq!(at_cap, Duration::from_secs(300));
}

#[test]
fn attempt_zero_is_base_delay() {
    assert_eq!(calculate_backoff_with(0, 1.0), Duration::from_secs(1));
}
