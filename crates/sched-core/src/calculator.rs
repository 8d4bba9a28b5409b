//! Sleep duration calculation.
//!
//! Before blocking, the event loop asks how long it may sleep without
//! missing a deadline. The answer is the distance to the nearest armed,
//! strictly-future deadline plus a fixed slippage margin, so the wait
//! ends just after the deadline instead of at or before it.
//!
//! The queue-aware variant checks an external work queue first: pending
//! work always means "don't sleep", whatever the timers say.

use crate::queue::PendingWork;
use crate::registry::TimeoutRegistry;
use crate::slot::Slot;
use sched_common::config::{SchedulerConfig, DEFAULT_SLIPPAGE};
use sched_common::time::{Clock, Timestamp};
use std::fmt;
use std::time::Duration;
use tracing::trace;

/// How long the caller may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SleepDuration {
    /// Work is already pending; do not sleep.
    Immediate,
    /// Sleep for at most this long.
    For(Duration),
    /// Nothing is scheduled; sleep until woken by something else.
    Indefinite,
}

impl SleepDuration {
    /// Timeout in the `Option<Duration>` form wait primitives take:
    /// `None` waits forever, `Some(Duration::ZERO)` does not wait.
    #[must_use]
    pub fn as_timeout(self) -> Option<Duration> {
        match self {
            Self::Immediate => Some(Duration::ZERO),
            Self::For(duration) => Some(duration),
            Self::Indefinite => None,
        }
    }

    /// Returns true for [`SleepDuration::Indefinite`].
    #[must_use]
    pub fn is_indefinite(self) -> bool {
        matches!(self, Self::Indefinite)
    }

    /// Returns true for [`SleepDuration::Immediate`].
    #[must_use]
    pub fn is_immediate(self) -> bool {
        matches!(self, Self::Immediate)
    }
}

impl fmt::Display for SleepDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => write!(f, "immediate"),
            Self::For(duration) => write!(f, "{}", humantime::format_duration(*duration)),
            Self::Indefinite => write!(f, "indefinite"),
        }
    }
}

/// Computes sleep durations from a [`TimeoutRegistry`].
///
/// Read-only with respect to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepCalculator {
    slippage: Duration,
}

impl Default for SleepCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_SLIPPAGE)
    }
}

impl SleepCalculator {
    /// Create a calculator adding `slippage` to every timed sleep.
    #[must_use]
    pub const fn new(slippage: Duration) -> Self {
        Self { slippage }
    }

    /// Create a calculator from configuration.
    #[must_use]
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.slippage)
    }

    /// Configured slippage margin.
    #[must_use]
    pub const fn slippage(&self) -> Duration {
        self.slippage
    }

    /// Time until the nearest future deadline, plus slippage.
    ///
    /// Returns [`SleepDuration::Indefinite`] when no slot is armed with a
    /// deadline strictly after now. Slots already due (including one due
    /// exactly now) do not shorten the sleep; the caller is expected to
    /// service them before sleeping.
    pub fn compute<S: Slot, const N: usize, C: Clock>(
        &self,
        registry: &TimeoutRegistry<S, N, C>,
    ) -> SleepDuration {
        self.compute_at(registry, registry.now())
    }

    /// [`compute`](Self::compute) against an already-sampled `now`.
    #[must_use]
    pub fn compute_at<S: Slot, const N: usize, C: Clock>(
        &self,
        registry: &TimeoutRegistry<S, N, C>,
        now: Timestamp,
    ) -> SleepDuration {
        match registry.next_deadline_at(now) {
            Some((slot, deadline)) => {
                let wait_ms = deadline.millis_since(now).unsigned_abs();
                let sleep = Duration::from_millis(wait_ms).saturating_add(self.slippage);
                trace!(?slot, %deadline, %now, sleep_ms = sleep.as_millis(), "Next wake-up");
                SleepDuration::For(sleep)
            }
            None => {
                trace!(%now, "No pending deadlines");
                SleepDuration::Indefinite
            }
        }
    }

    /// Like [`compute`](Self::compute), but returns
    /// [`SleepDuration::Immediate`] if `queue` holds any pending item.
    ///
    /// The queue is checked first; when it is non-empty neither the
    /// registry nor the clock is consulted.
    pub fn compute_with_queue<S, const N: usize, C, Q>(
        &self,
        registry: &TimeoutRegistry<S, N, C>,
        queue: &Q,
    ) -> SleepDuration
    where
        S: Slot,
        C: Clock,
        Q: PendingWork + ?Sized,
    {
        if let Some(immediate) = Self::pending_work(queue) {
            return immediate;
        }
        self.compute(registry)
    }

    /// [`compute_with_queue`](Self::compute_with_queue) against an
    /// already-sampled `now`.
    pub fn compute_with_queue_at<S, const N: usize, C, Q>(
        &self,
        registry: &TimeoutRegistry<S, N, C>,
        queue: &Q,
        now: Timestamp,
    ) -> SleepDuration
    where
        S: Slot,
        C: Clock,
        Q: PendingWork + ?Sized,
    {
        if let Some(immediate) = Self::pending_work(queue) {
            return immediate;
        }
        self.compute_at(registry, now)
    }

    fn pending_work<Q: PendingWork + ?Sized>(queue: &Q) -> Option<SleepDuration> {
        let pending = queue.pending();
        if pending > 0 {
            trace!(pending, "Work queued, not sleeping");
            Some(SleepDuration::Immediate)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::SlotIndex;
    use sched_common::time::ManualClock;
    use std::cell::Cell;
    use std::collections::VecDeque;

    type Registry<'a> = TimeoutRegistry<SlotIndex<4>, 4, &'a ManualClock>;

    const SLIPPAGE: Duration = Duration::from_millis(3);

    fn slot(i: usize) -> SlotIndex<4> {
        SlotIndex::new(i)
    }

    /// Queue whose only observable behaviour is its pending count, and
    /// which records whether it was consulted.
    struct CountingQueue {
        pending: usize,
        polled: Cell<u32>,
    }

    impl PendingWork for CountingQueue {
        fn pending(&self) -> usize {
            self.polled.set(self.polled.get() + 1);
            self.pending
        }
    }

    /// Clock that panics if read, to prove a path never samples time.
    struct UnreadableClock;

    impl Clock for UnreadableClock {
        fn now(&self) -> Timestamp {
            panic!("clock must not be read");
        }
    }

    #[test]
    fn test_no_armed_slots_is_indefinite() {
        let clock = ManualClock::new(1_000);
        let registry = Registry::new(&clock);
        let calc = SleepCalculator::new(SLIPPAGE);
        assert_eq!(calc.compute(&registry), SleepDuration::Indefinite);
    }

    #[test]
    fn test_single_slot_adds_slippage() {
        let clock = ManualClock::new(1_000);
        let mut registry = Registry::new(&clock);
        let calc = SleepCalculator::new(SLIPPAGE);

        registry.arm(slot(0), 3_000);
        assert_eq!(
            calc.compute(&registry),
            SleepDuration::For(Duration::from_millis(3_003))
        );

        registry.disarm(slot(0));
        assert_eq!(calc.compute(&registry), SleepDuration::Indefinite);
    }

    #[test]
    fn test_nearest_deadline_wins() {
        let clock = ManualClock::new(0);
        let mut registry = Registry::new(&clock);
        let calc = SleepCalculator::new(SLIPPAGE);

        registry.arm(slot(2), 500);
        registry.arm(slot(1), 200);
        registry.arm(slot(3), 900);
        assert_eq!(
            calc.compute(&registry),
            SleepDuration::For(Duration::from_millis(203))
        );

        clock.set(150);
        assert_eq!(
            calc.compute(&registry),
            SleepDuration::For(Duration::from_millis(53))
        );
    }

    #[test]
    fn test_due_slots_are_skipped() {
        let clock = ManualClock::new(0);
        let mut registry = Registry::new(&clock);
        let calc = SleepCalculator::new(SLIPPAGE);

        registry.arm(slot(0), 100);
        registry.arm(slot(1), -5);
        clock.set(100);
        // slot 0 is due exactly now, slot 1 is overdue: nothing upcoming
        assert_eq!(calc.compute(&registry), SleepDuration::Indefinite);

        registry.arm(slot(2), 40);
        assert_eq!(
            calc.compute(&registry),
            SleepDuration::For(Duration::from_millis(43))
        );
    }

    #[test]
    fn test_one_millisecond_ahead() {
        let clock = ManualClock::new(0);
        let mut registry = Registry::new(&clock);
        registry.arm(slot(0), 1);
        assert_eq!(
            SleepCalculator::new(Duration::ZERO).compute(&registry),
            SleepDuration::For(Duration::from_millis(1))
        );
    }

    #[test]
    fn test_compute_at_uses_given_time() {
        let clock = ManualClock::new(0);
        let mut registry = Registry::new(&clock);
        let calc = SleepCalculator::default();
        registry.arm(slot(0), 1_000);

        assert_eq!(
            calc.compute_at(&registry, Timestamp::from_millis(400)),
            SleepDuration::For(Duration::from_millis(603))
        );
    }

    #[test]
    fn test_pending_queue_is_immediate() {
        let clock = ManualClock::new(0);
        let mut registry = Registry::new(&clock);
        let calc = SleepCalculator::new(SLIPPAGE);
        registry.arm(slot(0), 10);

        let mut queue: VecDeque<u32> = VecDeque::new();
        assert_eq!(
            calc.compute_with_queue(&registry, &queue),
            SleepDuration::For(Duration::from_millis(13))
        );

        queue.push_back(7);
        assert_eq!(
            calc.compute_with_queue(&registry, &queue),
            SleepDuration::Immediate
        );

        registry.disarm(slot(0));
        assert_eq!(
            calc.compute_with_queue(&registry, &queue),
            SleepDuration::Immediate
        );

        queue.clear();
        assert_eq!(
            calc.compute_with_queue(&registry, &queue),
            SleepDuration::Indefinite
        );
    }

    #[test]
    fn test_pending_queue_skips_clock() {
        let registry = TimeoutRegistry::<SlotIndex<1>, 1, _>::new(UnreadableClock);
        let queue = CountingQueue {
            pending: 2,
            polled: Cell::new(0),
        };
        let calc = SleepCalculator::default();
        assert_eq!(
            calc.compute_with_queue(&registry, &queue),
            SleepDuration::Immediate
        );
        assert_eq!(queue.polled.get(), 1);
    }

    #[test]
    fn test_compute_with_queue_at() {
        let clock = ManualClock::new(0);
        let mut registry = Registry::new(&clock);
        registry.arm(slot(0), 100);
        let calc = SleepCalculator::new(Duration::ZERO);
        let empty: Vec<u8> = Vec::new();

        assert_eq!(
            calc.compute_with_queue_at(&registry, &empty[..], Timestamp::from_millis(60)),
            SleepDuration::For(Duration::from_millis(40))
        );
        assert_eq!(
            calc.compute_with_queue_at(&registry, &[1u8][..], Timestamp::from_millis(60)),
            SleepDuration::Immediate
        );
    }

    #[test]
    fn test_from_config() {
        let config = SchedulerConfig {
            slippage: Duration::from_millis(7),
            ..Default::default()
        };
        assert_eq!(
            SleepCalculator::from_config(&config).slippage(),
            Duration::from_millis(7)
        );
    }

    #[test]
    fn test_as_timeout() {
        assert_eq!(SleepDuration::Immediate.as_timeout(), Some(Duration::ZERO));
        assert_eq!(
            SleepDuration::For(Duration::from_secs(2)).as_timeout(),
            Some(Duration::from_secs(2))
        );
        assert_eq!(SleepDuration::Indefinite.as_timeout(), None);
        assert!(SleepDuration::Indefinite.is_indefinite());
        assert!(SleepDuration::Immediate.is_immediate());
    }

    #[test]
    fn test_display() {
        assert_eq!(SleepDuration::Immediate.to_string(), "immediate");
        assert_eq!(SleepDuration::Indefinite.to_string(), "indefinite");
        assert_eq!(
            SleepDuration::For(Duration::from_millis(1_503)).to_string(),
            "1s 503ms"
        );
    }
}
