//! Common fixtures for integration tests.

use sched_common::time::ManualClock;
use sched_core::{timeout_slots, SleepCalculator, TimeoutRegistry};
use std::sync::Arc;
use std::time::Duration;

timeout_slots! {
    /// Two-slot layout used by the scenarios.
    pub enum TestTimeout {
        First,
        Second,
    }
}

/// Registry sized for [`TestTimeout`].
pub type TestRegistry<C> = TimeoutRegistry<TestTimeout, { TestTimeout::COUNT }, C>;

/// Manual clock at t=0 and a registry reading it.
pub fn manual_registry() -> (Arc<ManualClock>, TestRegistry<Arc<ManualClock>>) {
    let clock = Arc::new(ManualClock::new(0));
    let registry = TestRegistry::new(Arc::clone(&clock));
    (clock, registry)
}

/// Calculator with the default 3ms slippage.
pub fn calculator() -> SleepCalculator {
    SleepCalculator::default()
}

/// Default slippage.
pub const SLIPPAGE: Duration = Duration::from_millis(3);
