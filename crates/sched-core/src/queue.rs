//! Pending-work view of an external queue.
//!
//! The queue-aware sleep calculation only needs to know whether a queue
//! holds unprocessed items. [`PendingWork`] is that view, implemented for
//! the standard collections and for [`WorkQueue`](crate::work_queue::WorkQueue).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// A queue that can report how many items are waiting.
pub trait PendingWork {
    /// Number of unprocessed items.
    fn pending(&self) -> usize;

    /// Returns true if at least one item is waiting.
    fn has_pending(&self) -> bool {
        self.pending() > 0
    }
}

impl<T> PendingWork for VecDeque<T> {
    fn pending(&self) -> usize {
        self.len()
    }
}

impl<T> PendingWork for Vec<T> {
    fn pending(&self) -> usize {
        self.len()
    }
}

impl<T> PendingWork for [T] {
    fn pending(&self) -> usize {
        self.len()
    }
}

impl<Q: PendingWork + ?Sized> PendingWork for &Q {
    fn pending(&self) -> usize {
        (**self).pending()
    }
}

impl<Q: PendingWork + ?Sized> PendingWork for Arc<Q> {
    fn pending(&self) -> usize {
        (**self).pending()
    }
}

impl<Q: PendingWork + ?Sized> PendingWork for Mutex<Q> {
    fn pending(&self) -> usize {
        // A poisoned queue still has a meaningful length
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending()
    }
}
