//! Real sleeps against the monotonic clock.

use super::common::{calculator, TestRegistry, TestTimeout, SLIPPAGE};
use sched_common::time::MonotonicClock;
use sched_core::{ExpiryCheck, SleepDuration, Wake, WorkQueue};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_sleep_lands_after_deadline() {
    let mut registry = TestRegistry::new(MonotonicClock::new());
    let calculator = calculator();

    registry.arm(TestTimeout::First, 40);
    assert!(!registry.check_expired(TestTimeout::First, ExpiryCheck::RequireActive));

    let sleep = calculator.compute(&registry);
    let timeout = sleep.as_timeout().unwrap();
    assert!(timeout <= Duration::from_millis(40) + SLIPPAGE);
    assert!(timeout >= Duration::from_millis(30));

    thread::sleep(timeout);
    assert!(registry.check_expired(TestTimeout::First, ExpiryCheck::RequireActive));
    assert_eq!(calculator.compute(&registry), SleepDuration::Indefinite);
}

#[test]
fn test_queue_wait_honours_computed_sleep() {
    let mut registry = TestRegistry::new(MonotonicClock::new());
    let calculator = calculator();
    let queue: WorkQueue<u32> = WorkQueue::new();

    registry.arm(TestTimeout::Second, 30);
    let start = Instant::now();
    let wake = queue.wait(calculator.compute_with_queue(&registry, &queue));

    assert_eq!(wake, Wake::Timeout);
    assert!(start.elapsed() >= Duration::from_millis(30));
    assert!(registry.is_expired(TestTimeout::Second));
}
