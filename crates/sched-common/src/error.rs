use thiserror::Error;

/// Scheduler error types.
///
/// The slot operations themselves are infallible; these cover the edges
/// where raw input enters the system.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// A raw slot index did not name one of the configured slots.
    #[error("slot index {index} out of range (slot count: {count})")]
    SlotOutOfRange {
        /// Rejected index.
        index: usize,
        /// Number of configured slots.
        count: usize,
    },

    /// The clock source could not be read.
    #[error("clock error: {0}")]
    Clock(String),

    /// The work queue was closed and no longer accepts items.
    #[error("work queue closed")]
    QueueClosed,
}

/// Convenience type alias for scheduler operations.
pub type SchedResult<T> = Result<T, SchedError>;
