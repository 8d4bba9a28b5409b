//! Deterministic timeout scenarios on a manual clock.

use super::common::{calculator, manual_registry, TestTimeout, SLIPPAGE};
use sched_core::{ExpiryCheck, SleepDuration};
use std::time::Duration;

#[test]
fn test_two_slots_expire_in_order() {
    let (clock, mut registry) = manual_registry();
    registry.arm(TestTimeout::First, 100);
    registry.arm(TestTimeout::Second, 120);

    clock.set(90);
    assert!(!registry.check_expired(TestTimeout::First, ExpiryCheck::RequireActive));
    assert!(!registry.check_expired(TestTimeout::Second, ExpiryCheck::RequireActive));

    clock.set(105);
    assert!(registry.check_expired(TestTimeout::First, ExpiryCheck::RequireActive));
    assert!(!registry.check_expired(TestTimeout::Second, ExpiryCheck::RequireActive));

    clock.set(125);
    assert!(registry.check_expired(TestTimeout::First, ExpiryCheck::RequireActive));
    assert!(registry.check_expired(TestTimeout::Second, ExpiryCheck::RequireActive));
}

#[test]
fn test_long_timeout_then_disarm() {
    let (_clock, mut registry) = manual_registry();
    let calculator = calculator();

    registry.arm(TestTimeout::First, 3_000);
    assert_eq!(
        calculator.compute(&registry),
        SleepDuration::For(Duration::from_millis(3_000) + SLIPPAGE)
    );

    registry.disarm(TestTimeout::First);
    assert_eq!(calculator.compute(&registry), SleepDuration::Indefinite);
}

#[test]
fn test_sleep_tracks_nearest_deadline() {
    let (clock, mut registry) = manual_registry();
    let calculator = calculator();

    registry.arm(TestTimeout::Second, 500);
    registry.arm(TestTimeout::First, 200);

    clock.set(50);
    assert_eq!(
        calculator.compute(&registry),
        SleepDuration::For(Duration::from_millis(150) + SLIPPAGE)
    );

    // Once First is due it no longer shortens the sleep
    clock.set(200);
    assert_eq!(
        calculator.compute(&registry),
        SleepDuration::For(Duration::from_millis(300) + SLIPPAGE)
    );
}

#[test]
fn test_rearm_replaces_deadline() {
    let (clock, mut registry) = manual_registry();

    registry.arm(TestTimeout::First, 100);
    clock.set(80);
    registry.arm(TestTimeout::First, 100);

    clock.set(150);
    assert!(!registry.is_expired(TestTimeout::First));
    clock.set(180);
    assert!(registry.is_expired(TestTimeout::First));
    assert!(registry.is_active(TestTimeout::First));
}

#[test]
fn test_disarmed_slot_never_reports_expiry() {
    let (clock, mut registry) = manual_registry();

    registry.arm(TestTimeout::First, 10);
    registry.disarm(TestTimeout::First);
    clock.set(1_000);

    assert!(!registry.is_active(TestTimeout::First));
    assert!(!registry.check_expired(TestTimeout::First, ExpiryCheck::RequireActive));
    // Deadline-only check on an inactive slot still reads as due
    assert!(registry.check_expired(TestTimeout::First, ExpiryCheck::DeadlineOnly));
}

#[test]
fn test_queue_overrides_deadlines() {
    let (_clock, mut registry) = manual_registry();
    let calculator = calculator();
    registry.arm(TestTimeout::First, 10_000);

    let pending = vec![1u8];
    assert_eq!(
        calculator.compute_with_queue(&registry, &pending),
        SleepDuration::Immediate
    );

    let empty: Vec<u8> = Vec::new();
    assert_eq!(
        calculator.compute_with_queue(&registry, &empty),
        SleepDuration::For(Duration::from_millis(10_000) + SLIPPAGE)
    );
}
