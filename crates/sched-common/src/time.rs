//! Monotonic time for the sleep scheduler.
//!
//! All deadlines are [`Timestamp`]s: signed milliseconds on the same
//! timebase as the [`Clock`] that produced them. On Linux the production
//! clock is `CLOCK_MONOTONIC`, so timestamps read as "milliseconds since
//! boot". Tests drive a [`ManualClock`] instead.

use crate::error::SchedResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Absolute monotonic timestamp in milliseconds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Clock epoch (boot).
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Create a timestamp from raw milliseconds.
    #[must_use]
    pub const fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    /// Raw milliseconds since the clock epoch.
    #[must_use]
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Offset this timestamp by a signed number of milliseconds.
    ///
    /// Saturates at the ends of the `i64` range instead of wrapping.
    #[must_use]
    pub const fn saturating_add_millis(self, delta_ms: i64) -> Self {
        Self(self.0.saturating_add(delta_ms))
    }

    /// Signed milliseconds from `earlier` to `self` (negative if `self` is before).
    #[must_use]
    pub const fn millis_since(self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Convert a [`Duration`] into signed milliseconds, saturating at `i64::MAX`.
#[must_use]
pub fn duration_to_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Source of monotonic time.
pub trait Clock {
    /// Current timestamp.
    fn now(&self) -> Timestamp;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// System monotonic clock.
///
/// Linux reads `CLOCK_MONOTONIC` (milliseconds since boot). Other platforms
/// count from the moment the clock was created. Readings never go backwards,
/// even if the underlying syscall fails.
#[derive(Debug)]
pub struct MonotonicClock {
    #[cfg(not(target_os = "linux"))]
    origin: std::time::Instant,
    last_ms: AtomicI64,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    /// Create a new monotonic clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "linux"))]
            origin: std::time::Instant::now(),
            last_ms: AtomicI64::new(0),
        }
    }

    /// Create a clock after checking the underlying source can be read.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::Clock`](crate::error::SchedError::Clock) if the system clock is unavailable.
    pub fn probe() -> SchedResult<Self> {
        let clock = Self::new();
        let ms = clock.read_millis()?;
        clock.last_ms.store(ms, Ordering::Release);
        Ok(clock)
    }

    #[cfg(target_os = "linux")]
    #[allow(clippy::useless_conversion)] // time_t and c_long are 32-bit on some targets
    fn read_millis(&self) -> SchedResult<i64> {
        use nix::time::{clock_gettime, ClockId};

        let ts = clock_gettime(ClockId::CLOCK_MONOTONIC).map_err(|e| {
            crate::error::SchedError::Clock(format!("clock_gettime(CLOCK_MONOTONIC): {e}"))
        })?;
        Ok(i64::from(ts.tv_sec()) * 1_000 + i64::from(ts.tv_nsec()) / 1_000_000)
    }

    #[cfg(not(target_os = "linux"))]
    #[allow(clippy::unnecessary_wraps)]
    fn read_millis(&self) -> SchedResult<i64> {
        Ok(duration_to_millis(self.origin.elapsed()))
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        let ms = match self.read_millis() {
            Ok(ms) => self.last_ms.fetch_max(ms, Ordering::AcqRel).max(ms),
            Err(e) => {
                tracing::warn!(error = %e, "Monotonic clock read failed, reusing last reading");
                self.last_ms.load(Ordering::Acquire)
            }
        };
        Timestamp(ms)
    }
}

/// Manually driven clock for tests and simulation.
///
/// Time only moves when [`advance`](Self::advance) or [`set`](Self::set)
/// is called. Shareable across threads.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    /// Create a manual clock reading `start_ms`.
    #[must_use]
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, ms: i64) {
        self.now_ms.store(ms, Ordering::Release);
    }

    /// Move time forward (or backward, for a negative delta).
    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::AcqRel);
    }

    /// Move time forward by a [`Duration`].
    pub fn advance_by(&self, duration: Duration) {
        self.advance(duration_to_millis(duration));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now_ms.load(Ordering::Acquire))
    }
}
