// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_utc_is_recent() {
    let clock = SystemClock;
    let t = clock.now_utc();
    // Sanity: after 2020, before 2100.
    assert!(t.timestamp() > 1_577_836_800);
    assert!(t.timestamp() < 4_102_444_800);
}

#[test]
fn system_clock_does_not_go_backwards() {
    let clock = SystemClock;
    let a = clock.now_utc();
    let b = clock.now_utc();
    assert!(b >= a);
}

#[test]
fn fake_clock_advance_moves_time() {
    let clock = FakeClock::new();
    let start = clock.now_utc();

    clock.advance(Duration::from_secs(90));
    assert_eq!((clock.now_utc() - start).num_seconds(), 90);
}

#[test]
fn fake_clock_set_epoch_ms() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_700_000_000_000);
    assert_eq!(clock.now_utc().timestamp_millis(), 1_700_000_000_000);
}

#[test]
fn fake_clock_clones_share_state() {
    let clock = FakeClock::new();
    let other = clock.clone();
    clock.advance(Duration::from_secs(5));
    assert_eq!(other.now_utc(), clock.now_utc());
}
