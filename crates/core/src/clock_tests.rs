// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fake_clock_advances_both_instant_and_utc() {
    let clock = FakeClock::new();
    let before_instant = clock.now();
    let before_utc = clock.utc_now();

    clock.advance(Duration::from_secs(30));

    assert!(clock.now() >= before_instant + Duration::from_secs(30));
    assert_eq!(clock.utc_now(), before_utc + chrono::Duration::seconds(30));
}

#[test]
fn set_utc_does_not_move_instant() {
    let clock = FakeClock::new();
    let instant_before = clock.now();
    clock.set_utc(Utc::now());
    assert_eq!(clock.now(), instant_before);
}
