//! Lock-guarded registry for multi-threaded use.
//!
//! [`TimeoutRegistry`] assumes a single execution context. When several
//! threads arm, disarm or check the same slot set, wrap it in a
//! [`SharedRegistry`]: every operation, including the sleep scan, runs
//! under one lock, so a scan never observes a half-applied update.

use crate::calculator::{SleepCalculator, SleepDuration};
use crate::queue::PendingWork;
use crate::registry::{ExpiryCheck, SlotState, TimeoutRegistry};
use crate::slot::{Slot, SlotIndex};
use sched_common::time::{Clock, MonotonicClock, Timestamp};
use static_assertions::assert_impl_all;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A [`TimeoutRegistry`] behind a mutex.
#[derive(Debug)]
pub struct SharedRegistry<S: Slot, const N: usize, C: Clock> {
    inner: Mutex<TimeoutRegistry<S, N, C>>,
}

assert_impl_all!(SharedRegistry<SlotIndex<4>, 4, MonotonicClock>: Send, Sync);

impl<S: Slot, const N: usize, C: Clock> SharedRegistry<S, N, C> {
    /// Create a shared registry with every slot inactive.
    #[must_use]
    pub fn new(clock: C) -> Self {
        Self::from_registry(TimeoutRegistry::new(clock))
    }

    /// Wrap an existing registry.
    #[must_use]
    pub fn from_registry(registry: TimeoutRegistry<S, N, C>) -> Self {
        Self {
            inner: Mutex::new(registry),
        }
    }

    /// Unwrap the registry.
    pub fn into_inner(self) -> TimeoutRegistry<S, N, C> {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // Registry state is plain data, valid even if a holder panicked.
    fn lock(&self) -> MutexGuard<'_, TimeoutRegistry<S, N, C>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access, for compound check-then-act updates.
    pub fn with<R>(&self, f: impl FnOnce(&mut TimeoutRegistry<S, N, C>) -> R) -> R {
        f(&mut *self.lock())
    }

    /// See [`TimeoutRegistry::arm`].
    pub fn arm(&self, slot: S, timeout_ms: i64) -> Timestamp {
        self.lock().arm(slot, timeout_ms)
    }

    /// See [`TimeoutRegistry::disarm`].
    pub fn disarm(&self, slot: S) {
        self.lock().disarm(slot);
    }

    /// See [`TimeoutRegistry::is_active`].
    pub fn is_active(&self, slot: S) -> bool {
        self.lock().is_active(slot)
    }

    /// See [`TimeoutRegistry::state`].
    pub fn state(&self, slot: S) -> SlotState {
        self.lock().state(slot)
    }

    /// See [`TimeoutRegistry::check_expired`].
    pub fn check_expired(&self, slot: S, check: ExpiryCheck) -> bool {
        self.lock().check_expired(slot, check)
    }

    /// Disarm `slot` if it is due, returning whether it was.
    ///
    /// The check and the disarm happen under one lock, so exactly one
    /// caller observes each expiry.
    pub fn take_expired(&self, slot: S) -> bool {
        let mut registry = self.lock();
        let due = registry.check_expired(slot, ExpiryCheck::RequireActive);
        if due {
            registry.disarm(slot);
        }
        due
    }

    /// See [`SleepCalculator::compute`].
    pub fn sleep_duration(&self, calculator: &SleepCalculator) -> SleepDuration {
        calculator.compute(&*self.lock())
    }

    /// See [`SleepCalculator::compute_with_queue`].
    pub fn sleep_duration_with_queue<Q: PendingWork + ?Sized>(
        &self,
        calculator: &SleepCalculator,
        queue: &Q,
    ) -> SleepDuration {
        if queue.has_pending() {
            return SleepDuration::Immediate;
        }
        self.sleep_duration(calculator)
    }
}
