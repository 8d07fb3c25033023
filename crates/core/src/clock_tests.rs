// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Foreman Systems

use super::*;

#[test]
fn fake_clock_starts_at_configured_value() {
    let clock = FakeClock::new(1_000);
    assert_eq!(clock.epoch_ms(), 1_000);
}

#[test]
fn fake_clock_advances_by_delta() {
    let clock = FakeClock::new(0);
    clock.advance(Duration::from_millis(250));
    assert_eq!(clock.epoch_ms(), 250);
}

#[test]
fn fake_clock_clones_share_state() {
    let clock = FakeClock::new(0);
    let clone = clock.clone();
    clock.advance(Duration::from_millis(10));
    assert_eq!(clone.epoch_ms(), 10);
}

#[test]
fn system_clock_is_monotonic_nondecreasing() {
    let clock = SystemClock;
    let a = clock.epoch_ms();
    let b = clock.epoch_ms();
    assert!(b >= a);
}