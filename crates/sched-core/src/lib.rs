//! Timeout registry and sleep duration calculation for power-aware event loops.
//!
//! An event loop that wants to sleep as long as possible, without missing
//! any internal deadline, keeps its timeouts in a [`TimeoutRegistry`] and
//! asks a [`SleepCalculator`] how long it may block:
//!
//! - **Slots** ([`slot`]): compile-time timeout identifiers, declared with
//!   [`timeout_slots!`] or numbered with [`SlotIndex`]
//! - **Registry** ([`registry`]): arm, disarm, query and check slots
//! - **Calculator** ([`calculator`]): nearest deadline plus slippage, or
//!   "don't sleep" when work is already queued
//! - **Queues** ([`queue`], [`work_queue`]): the pending-work view the
//!   calculator consults, and a blocking queue to sleep on
//! - **Shared** ([`shared`]): the registry behind a lock, for multi-threaded use
//!
//! # Example
//!
//! ```
//! use sched_common::ManualClock;
//! use sched_core::{timeout_slots, ExpiryCheck, SleepCalculator, SleepDuration, TimeoutRegistry};
//! use std::collections::VecDeque;
//! use std::time::Duration;
//!
//! timeout_slots! {
//!     enum Timeout {
//!         Heartbeat,
//!         Retry,
//!     }
//! }
//!
//! let clock = ManualClock::new(1_000);
//! let mut registry = TimeoutRegistry::<Timeout, { Timeout::COUNT }, _>::new(&clock);
//! let calc = SleepCalculator::new(Duration::from_millis(3));
//!
//! // Nothing armed: sleep until something else wakes us
//! assert_eq!(calc.compute(&registry), SleepDuration::Indefinite);
//!
//! registry.arm(Timeout::Heartbeat, 500);
//! registry.arm(Timeout::Retry, 200);
//! assert_eq!(calc.compute(&registry), SleepDuration::For(Duration::from_millis(203)));
//!
//! // Queued work always wins over timers
//! let queue = VecDeque::from([()]);
//! assert_eq!(calc.compute_with_queue(&registry, &queue), SleepDuration::Immediate);
//!
//! // After waking, service whatever is due
//! clock.advance(203);
//! assert!(registry.check_expired(Timeout::Retry, ExpiryCheck::RequireActive));
//! assert!(!registry.check_expired(Timeout::Heartbeat, ExpiryCheck::RequireActive));
//! registry.disarm(Timeout::Retry);
//! ```

pub mod calculator;
pub mod queue;
pub mod registry;
pub mod shared;
pub mod slot;
pub mod work_queue;

pub use calculator::{SleepCalculator, SleepDuration};
pub use queue::PendingWork;
pub use registry::{ExpiryCheck, SlotState, TimeoutRegistry};
pub use shared::SharedRegistry;
pub use slot::{Slot, SlotIndex};
pub use work_queue::{Wake, WorkQueue};
