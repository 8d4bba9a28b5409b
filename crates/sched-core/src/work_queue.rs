//! Blocking producer/consumer queue.
//!
//! A reference queue for event loops built on the sleep calculator: any
//! thread may [`push`](WorkQueue::push), and the loop blocks in
//! [`wait`](WorkQueue::wait) for the computed [`SleepDuration`]. A push
//! ends the wait early, as does [`close`](WorkQueue::close).

use crate::calculator::SleepDuration;
use crate::queue::PendingWork;
use sched_common::error::{SchedError, SchedResult};
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::debug;

/// Why [`WorkQueue::wait`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// At least one item is queued.
    Work,
    /// The sleep elapsed with the queue still empty.
    Timeout,
    /// The queue was closed.
    Closed,
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Mutex-and-condvar FIFO shared between producers and one event loop.
#[derive(Debug)]
pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    ready: Condvar,
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    /// Create an empty, open queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item and wake the waiting consumer.
    ///
    /// # Errors
    ///
    /// Returns [`SchedError::QueueClosed`] after [`close`](Self::close).
    pub fn push(&self, item: T) -> SchedResult<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(SchedError::QueueClosed);
        }
        state.items.push_back(item);
        drop(state);
        self.ready.notify_one();
        Ok(())
    }

    /// Remove the oldest item.
    pub fn pop(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    /// Remove every queued item, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.lock().items.drain(..).collect()
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Stop accepting items and wake all waiters.
    ///
    /// Items already queued can still be popped.
    pub fn close(&self) {
        let mut state = self.lock();
        if !state.closed {
            state.closed = true;
            debug!(pending = state.items.len(), "Work queue closed");
        }
        drop(state);
        self.ready.notify_all();
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Block for at most `sleep`.
    ///
    /// Returns as soon as an item is queued or the queue is closed.
    /// [`SleepDuration::Immediate`] never blocks and
    /// [`SleepDuration::Indefinite`] blocks until one of those happens.
    /// Queued items take precedence over a close.
    pub fn wait(&self, sleep: SleepDuration) -> Wake {
        // A deadline too far out to represent is the same as no deadline
        let deadline = sleep
            .as_timeout()
            .and_then(|timeout| Instant::now().checked_add(timeout));
        let mut state = self.lock();

        loop {
            if !state.items.is_empty() {
                return Wake::Work;
            }
            if state.closed {
                return Wake::Closed;
            }

            match deadline {
                None => {
                    state = self
                        .ready
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Wake::Timeout;
                    }
                    state = self
                        .ready
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
    }
}

impl<T> PendingWork for WorkQueue<T> {
    fn pending(&self) -> usize {
        self.len()
    }
}
