// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_epoch_is_sane() {
    let clock = SystemClock;
    // Anything after 2023 and before 2100.
    let ms = clock.epoch_ms();
    assert!(ms > 1_600_000_000_000);
    assert!(ms < 4_100_000_000_000);
}

#[test]
fn fake_clock_advances_both_axes() {
    let clock = FakeClock::new();
    let t0 = clock.now();
    let e0 = clock.epoch_ms();
    clock.advance(Duration::from_millis(1500));
    assert_eq!(clock.epoch_ms(), e0 + 1500);
    assert!(clock.now().duration_since(t0) >= Duration::from_millis(1500));
}

#[test]
fn fake_clock_clones_share_state() {
    let a = FakeClock::new();
    let b = a.clone();
    b.advance(Duration::from_secs(10));
    assert_eq!(a.epoch_ms(), b.epoch_ms());
}

#[test]
fn fake_clock_set_epoch() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(42);
    assert_eq!(clock.epoch_ms(), 42);
}
