//! Timeout registry.
//!
//! A fixed-size table holding one [`SlotState`] per slot. Slots are armed
//! with a relative timeout, which is turned into an absolute deadline on
//! the registry's clock, and stay armed until explicitly disarmed or
//! re-armed. Expiry never clears a slot by itself: the application
//! acknowledges a due timeout by disarming or re-arming it.
//!
//! Every time-dependent operation has an `_at` variant taking a timestamp
//! the caller already sampled, so an event loop can read the clock once
//! per wake-up.

use crate::slot::Slot;
use sched_common::time::{duration_to_millis, Clock, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::trace;

/// State of a single timeout slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SlotState {
    /// Not armed.
    #[default]
    Inactive,
    /// Armed with an absolute deadline, which may already be in the past.
    Armed {
        /// When the timeout becomes due.
        deadline: Timestamp,
    },
}

impl SlotState {
    /// Returns true if the slot is armed.
    #[must_use]
    pub fn is_armed(self) -> bool {
        matches!(self, Self::Armed { .. })
    }

    /// Deadline of an armed slot.
    #[must_use]
    pub fn deadline(self) -> Option<Timestamp> {
        match self {
            Self::Armed { deadline } => Some(deadline),
            Self::Inactive => None,
        }
    }

    /// Whether the slot is due at `now` under the given check.
    ///
    /// An inactive slot is compared against the clock epoch under
    /// [`ExpiryCheck::DeadlineOnly`], so it reads as due once the clock
    /// has started.
    #[must_use]
    pub fn is_due(self, now: Timestamp, check: ExpiryCheck) -> bool {
        match (self, check) {
            (Self::Armed { deadline }, _) => now >= deadline,
            (Self::Inactive, ExpiryCheck::RequireActive) => false,
            (Self::Inactive, ExpiryCheck::DeadlineOnly) => now >= Timestamp::EPOCH,
        }
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => write!(f, "inactive"),
            Self::Armed { deadline } => write!(f, "armed until {deadline}"),
        }
    }
}

/// How [`TimeoutRegistry::check_expired`] treats inactive slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExpiryCheck {
    /// Due only if armed and the deadline has been reached.
    #[default]
    RequireActive,
    /// Due if the deadline has been reached, whether or not the slot is
    /// armed. Only meaningful for slots known to be armed: an inactive slot
    /// always reads as due.
    DeadlineOnly,
}

impl ExpiryCheck {
    /// Map the classic `require_active` flag onto a check mode.
    #[must_use]
    pub fn from_require_active(require_active: bool) -> Self {
        if require_active {
            Self::RequireActive
        } else {
            Self::DeadlineOnly
        }
    }
}

/// Fixed-size table of timeout slots.
///
/// `N` must equal `S::COUNT`; a mismatch fails to compile when the
/// registry is constructed. The registry owns its clock (`C` may be a
/// reference or `Arc` so tests can share a [`ManualClock`] with it).
///
/// No internal locking: writes take `&mut self`. Use
/// [`SharedRegistry`](crate::shared::SharedRegistry) when several threads
/// need the same slot set.
///
/// [`ManualClock`]: sched_common::time::ManualClock
pub struct TimeoutRegistry<S: Slot, const N: usize, C: Clock> {
    clock: C,
    slots: [SlotState; N],
    _slot: PhantomData<fn() -> S>,
}

impl<S: Slot, const N: usize, C: Clock> TimeoutRegistry<S, N, C> {
    const SIZE_MATCHES_SLOT_COUNT: () = assert!(
        S::COUNT == N,
        "registry size must equal the slot type's COUNT"
    );

    /// Create a registry with every slot inactive.
    #[must_use]
    pub fn new(clock: C) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::SIZE_MATCHES_SLOT_COUNT;

        Self {
            clock,
            slots: [SlotState::Inactive; N],
            _slot: PhantomData,
        }
    }

    /// The clock deadlines are measured against.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Current time on the registry's clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Arm `slot` to expire `timeout_ms` milliseconds from now.
    ///
    /// Re-arming an armed slot replaces its deadline. A zero or negative
    /// timeout yields a deadline that is already due. Returns the deadline.
    pub fn arm(&mut self, slot: S, timeout_ms: i64) -> Timestamp {
        let now = self.clock.now();
        self.arm_at(slot, now, timeout_ms)
    }

    /// Arm `slot` to expire after `timeout`.
    pub fn arm_for(&mut self, slot: S, timeout: Duration) -> Timestamp {
        self.arm(slot, duration_to_millis(timeout))
    }

    /// Arm `slot` relative to an already-sampled `now`.
    pub fn arm_at(&mut self, slot: S, now: Timestamp, timeout_ms: i64) -> Timestamp {
        let deadline = now.saturating_add_millis(timeout_ms);
        self.slots[slot.index()] = SlotState::Armed { deadline };
        trace!(?slot, %deadline, timeout_ms, "Timeout armed");
        deadline
    }

    /// Disarm `slot`. Disarming an inactive slot is a no-op.
    pub fn disarm(&mut self, slot: S) {
        let state = &mut self.slots[slot.index()];
        if state.is_armed() {
            trace!(?slot, "Timeout disarmed");
        }
        *state = SlotState::Inactive;
    }

    /// Disarm every slot.
    pub fn disarm_all(&mut self) {
        self.slots = [SlotState::Inactive; N];
        trace!("All timeouts disarmed");
    }

    /// Returns true if `slot` is armed.
    #[must_use]
    pub fn is_active(&self, slot: S) -> bool {
        self.slots[slot.index()].is_armed()
    }

    /// Current state of `slot`.
    #[must_use]
    pub fn state(&self, slot: S) -> SlotState {
        self.slots[slot.index()]
    }

    /// Deadline of `slot`, if armed.
    #[must_use]
    pub fn deadline(&self, slot: S) -> Option<Timestamp> {
        self.slots[slot.index()].deadline()
    }

    /// Signed milliseconds until `slot` is due (negative once past due).
    pub fn remaining(&self, slot: S) -> Option<i64> {
        self.remaining_at(slot, self.clock.now())
    }

    /// [`remaining`](Self::remaining) against an already-sampled `now`.
    #[must_use]
    pub fn remaining_at(&self, slot: S, now: Timestamp) -> Option<i64> {
        self.deadline(slot).map(|deadline| deadline.millis_since(now))
    }

    /// Whether `slot` is due now.
    ///
    /// See [`ExpiryCheck`] for how inactive slots are treated.
    pub fn check_expired(&self, slot: S, check: ExpiryCheck) -> bool {
        self.check_expired_at(slot, check, self.clock.now())
    }

    /// [`check_expired`](Self::check_expired) against an already-sampled `now`.
    #[must_use]
    pub fn check_expired_at(&self, slot: S, check: ExpiryCheck, now: Timestamp) -> bool {
        self.slots[slot.index()].is_due(now, check)
    }

    /// Shorthand for `check_expired(slot, ExpiryCheck::RequireActive)`.
    pub fn is_expired(&self, slot: S) -> bool {
        self.check_expired(slot, ExpiryCheck::RequireActive)
    }

    /// Iterate over every slot and its state, in index order.
    pub fn iter(&self) -> impl Iterator<Item = (S, SlotState)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, state)| S::from_index(i).map(|slot| (slot, *state)))
    }

    /// Raw slot states, in index order.
    #[must_use]
    pub fn states(&self) -> &[SlotState] {
        &self.slots
    }

    /// Armed slots whose deadline has been reached.
    pub fn expired(&self) -> impl Iterator<Item = S> + '_ {
        self.expired_at(self.clock.now())
    }

    /// [`expired`](Self::expired) against an already-sampled `now`.
    pub fn expired_at(&self, now: Timestamp) -> impl Iterator<Item = S> + '_ {
        self.iter()
            .filter(move |(_, state)| state.is_due(now, ExpiryCheck::RequireActive))
            .map(|(slot, _)| slot)
    }

    /// Earliest deadline strictly after now, with its slot.
    pub fn next_deadline(&self) -> Option<(S, Timestamp)> {
        self.next_deadline_at(self.clock.now())
    }

    /// Earliest deadline strictly after `now`, with its slot.
    ///
    /// Inactive slots and slots already due (including a deadline equal to
    /// `now`) are skipped. Among equal deadlines the lowest index wins.
    #[must_use]
    pub fn next_deadline_at(&self, now: Timestamp) -> Option<(S, Timestamp)> {
        self.iter()
            .filter_map(|(slot, state)| state.deadline().map(|deadline| (slot, deadline)))
            .filter(|&(_, deadline)| deadline > now)
            .min_by_key(|&(_, deadline)| deadline)
    }
}

impl<S: Slot, const N: usize, C: Clock + Default> Default for TimeoutRegistry<S, N, C> {
    fn default() -> Self {
        Self::new(C::default())
    }
}

impl<S: Slot, const N: usize, C: Clock> fmt::Debug for TimeoutRegistry<S, N, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
