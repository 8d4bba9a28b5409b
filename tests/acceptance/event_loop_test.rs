//! Producer/consumer loop built from the public API.

use super::common::{calculator, TestRegistry, TestTimeout};
use sched_common::time::MonotonicClock;
use sched_core::{SharedRegistry, SleepDuration, Wake, WorkQueue};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_producer_wakes_indefinite_sleep() {
    let registry = TestRegistry::new(MonotonicClock::new());
    let calculator = calculator();
    let queue = Arc::new(WorkQueue::new());

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            for item in 0..3u32 {
                thread::sleep(Duration::from_millis(10));
                queue.push(item).unwrap();
            }
            queue.close();
        })
    };

    let mut received = Vec::new();
    loop {
        let sleep = calculator.compute_with_queue(&registry, queue.as_ref());
        if received.is_empty() && queue.is_empty() {
            assert_eq!(sleep, SleepDuration::Indefinite);
        }
        match queue.wait(sleep) {
            Wake::Work => received.extend(queue.drain()),
            Wake::Closed => break,
            Wake::Timeout => panic!("indefinite sleep timed out"),
        }
    }

    producer.join().unwrap();
    assert_eq!(received, vec![0, 1, 2]);
}

#[test]
fn test_shared_registry_armed_from_other_thread() {
    let registry: Arc<SharedRegistry<TestTimeout, { TestTimeout::COUNT }, MonotonicClock>> =
        Arc::new(SharedRegistry::new(MonotonicClock::new()));
    let calculator = calculator();
    let queue: WorkQueue<()> = WorkQueue::new();

    assert_eq!(registry.sleep_duration(&calculator), SleepDuration::Indefinite);

    let arming = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || registry.arm(TestTimeout::First, 20))
    };
    arming.join().unwrap();

    let start = Instant::now();
    loop {
        if registry.take_expired(TestTimeout::First) {
            break;
        }
        let sleep = registry.sleep_duration_with_queue(&calculator, &queue);
        assert!(!sleep.is_indefinite());
        queue.wait(sleep);
    }

    assert!(start.elapsed() >= Duration::from_millis(15));
    assert!(!registry.is_active(TestTimeout::First));
}
