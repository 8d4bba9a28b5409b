//! Signal handling for the scheduler daemon.
//!
//! SIGTERM, SIGINT and SIGHUP are blocked on the calling thread (and so on
//! every thread spawned afterwards) and consumed by a dedicated thread
//! parked in `sigwait`. That thread never polls: the daemon stays asleep
//! until a signal actually arrives, then hands it to a callback.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Signal types that the daemon handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// SIGTERM - Graceful termination request.
    Terminate,
    /// SIGINT - Interrupt (Ctrl+C).
    Interrupt,
    /// SIGHUP - Hangup, used for config reload.
    Hangup,
}

impl SignalKind {
    /// Returns true for signals that end the daemon.
    pub fn is_shutdown(self) -> bool {
        matches!(self, SignalKind::Terminate | SignalKind::Interrupt)
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Terminate => write!(f, "SIGTERM"),
            SignalKind::Interrupt => write!(f, "SIGINT"),
            SignalKind::Hangup => write!(f, "SIGHUP"),
        }
    }
}

/// Shared state for signal handling.
///
/// Written by the signal thread, read by the main loop.
#[derive(Debug, Default)]
pub struct SignalState {
    /// Set to true when a shutdown signal is received.
    shutdown_requested: AtomicBool,
    /// Count of signals received (for diagnostics).
    signal_count: AtomicU32,
}

impl SignalState {
    /// Create a new signal state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Relaxed)
    }

    /// Request shutdown (can be called from any thread).
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Relaxed);
    }

    /// Record a signal.
    fn record_signal(&self, kind: SignalKind) {
        self.signal_count.fetch_add(1, Ordering::Relaxed);
        if kind.is_shutdown() {
            self.request_shutdown();
        }
    }

    /// Get the total number of signals received.
    pub fn signal_count(&self) -> u32 {
        self.signal_count.load(Ordering::Relaxed)
    }
}

/// Handle for signal management.
#[derive(Clone)]
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    /// Block the handled signals and start the signal thread.
    ///
    /// Must be called before spawning any other thread, so that none of
    /// them inherits an unblocked mask and steals a signal. `on_signal`
    /// runs on the signal thread for every signal received.
    ///
    /// On non-Unix platforms no signals are handled; only manual shutdown
    /// is available.
    pub fn install<F>(on_signal: F) -> std::io::Result<Self>
    where
        F: Fn(SignalKind) + Send + 'static,
    {
        let handler = Self {
            state: Arc::new(SignalState::new()),
        };

        #[cfg(unix)]
        handler.spawn_unix_waiter(on_signal)?;
        #[cfg(not(unix))]
        drop(on_signal);

        Ok(handler)
    }

    #[cfg(unix)]
    fn spawn_unix_waiter<F>(&self, on_signal: F) -> std::io::Result<()>
    where
        F: Fn(SignalKind) + Send + 'static,
    {
        use nix::sys::signal::{SigSet, Signal};

        let mut set = SigSet::empty();
        set.add(Signal::SIGTERM);
        set.add(Signal::SIGINT);
        set.add(Signal::SIGHUP);
        set.thread_block().map_err(std::io::Error::from)?;

        let state = Arc::clone(&self.state);
        std::thread::Builder::new()
            .name("sched-signals".into())
            .spawn(move || loop {
                let kind = match set.wait() {
                    Ok(Signal::SIGTERM) => SignalKind::Terminate,
                    Ok(Signal::SIGINT) => SignalKind::Interrupt,
                    Ok(Signal::SIGHUP) => SignalKind::Hangup,
                    Ok(other) => {
                        debug!(signal = ?other, "Ignoring unexpected signal");
                        continue;
                    }
                    Err(e) => {
                        debug!(error = %e, "sigwait failed, signal thread exiting");
                        break;
                    }
                };
                info!(signal = %kind, "Signal received");
                state.record_signal(kind);
                on_signal(kind);
            })?;

        debug!("Unix signal handlers registered");
        Ok(())
    }

    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.state.shutdown_requested()
    }

    /// Get the signal state for inspection.
    pub fn state(&self) -> &SignalState {
        &self.state
    }
}
