//! Daemon event loop.
//!
//! Each iteration asks the calculator how long it may sleep, blocks on the
//! work queue for that long, then drains queued events and services every
//! expired timeout:
//!
//! - `Heartbeat` fires periodically and is always re-armed.
//! - `Retry` is armed when a job fails and retries every failed job.
//! - `IdleFlush` is re-armed by every job, so it fires once the queue has
//!   been quiet for the configured period, and flushes finished jobs.

use anyhow::Result;
use sched_common::config::{DaemonConfig, SchedulerConfig};
use sched_common::time::{duration_to_millis, Clock, Timestamp};
use sched_core::{timeout_slots, SleepCalculator, SleepDuration, TimeoutRegistry, Wake, WorkQueue};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

timeout_slots! {
    /// Timeouts driven by the daemon.
    pub enum DaemonTimeout {
        /// Periodic liveness log.
        Heartbeat,
        /// Re-run jobs that failed.
        Retry,
        /// Flush finished jobs once the queue goes quiet.
        IdleFlush,
    }
}

/// Registry sized for [`DaemonTimeout`].
pub type DaemonRegistry<C> = TimeoutRegistry<DaemonTimeout, { DaemonTimeout::COUNT }, C>;

/// Items delivered to the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A unit of work with its sequence number.
    Job(u64),
    /// Reload configuration.
    Reload,
}

/// Counters reported at shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Times the loop returned from a wait.
    pub wakeups: u64,
    /// Wake-ups that skipped sleeping because work was queued.
    pub immediate: u64,
    /// Jobs received.
    pub jobs: u64,
    /// Jobs that failed their first attempt.
    pub failures: u64,
    /// Heartbeats emitted.
    pub heartbeats: u64,
    /// Flushes performed.
    pub flushes: u64,
    /// Jobs written out by flushes.
    pub flushed_jobs: u64,
}

/// Reloads configuration on request.
pub type Reloader = Box<dyn FnMut() -> Result<SchedulerConfig> + Send>;

/// The daemon's single-threaded event loop.
pub struct EventLoop<C: Clock> {
    registry: DaemonRegistry<C>,
    calculator: SleepCalculator,
    periods: DaemonConfig,
    queue: Arc<WorkQueue<Event>>,
    reloader: Option<Reloader>,
    /// Finished jobs awaiting the idle flush.
    finished: Vec<u64>,
    /// Jobs awaiting retry.
    failed: Vec<u64>,
    stats: LoopStats,
}

impl<C: Clock> EventLoop<C> {
    /// Create the loop and arm the heartbeat.
    pub fn new(clock: C, config: &SchedulerConfig, queue: Arc<WorkQueue<Event>>) -> Self {
        let mut registry = DaemonRegistry::new(clock);
        registry.arm_for(DaemonTimeout::Heartbeat, config.daemon.heartbeat);

        Self {
            registry,
            calculator: SleepCalculator::from_config(config),
            periods: config.daemon.clone(),
            queue,
            reloader: None,
            finished: Vec::new(),
            failed: Vec::new(),
            stats: LoopStats::default(),
        }
    }

    /// Install the handler for [`Event::Reload`].
    pub fn set_reloader(&mut self, reloader: Reloader) {
        self.reloader = Some(reloader);
    }

    /// Timeout registry.
    pub fn registry(&self) -> &DaemonRegistry<C> {
        &self.registry
    }

    /// Counters so far.
    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// How long the next wait may last.
    pub fn next_sleep(&self) -> SleepDuration {
        self.calculator
            .compute_with_queue(&self.registry, self.queue.as_ref())
    }

    /// Sleep, then handle everything that woke us.
    pub fn run_once(&mut self) -> Wake {
        let sleep = self.next_sleep();
        trace!(%sleep, "Waiting");
        if sleep.is_immediate() {
            self.stats.immediate += 1;
        }

        let wake = self.queue.wait(sleep);
        self.stats.wakeups += 1;

        let now = self.registry.now();
        for event in self.queue.drain() {
            self.handle_event(event, now);
        }
        self.service_expired(now);
        wake
    }

    /// Run until the queue is closed or `max_wakeups` is reached (0 = no limit).
    pub fn run(&mut self, max_wakeups: u64) -> LoopStats {
        info!(max_wakeups, "Entering event loop");

        loop {
            if self.run_once() == Wake::Closed {
                info!("Work queue closed, leaving event loop");
                break;
            }
            if max_wakeups > 0 && self.stats.wakeups >= max_wakeups {
                info!(wakeups = self.stats.wakeups, "Maximum wake-up count reached");
                break;
            }
        }

        self.flush();
        self.stats
    }

    /// Handle one queued event.
    pub fn handle_event(&mut self, event: Event, now: Timestamp) {
        match event {
            Event::Job(id) => self.handle_job(id, now),
            Event::Reload => self.reload(now),
        }
    }

    fn handle_job(&mut self, id: u64, now: Timestamp) {
        self.stats.jobs += 1;

        // Every third job fails its first attempt
        if id % 3 == 2 {
            self.stats.failures += 1;
            warn!(job = id, "Job failed, scheduling retry");
            self.failed.push(id);
            if !self.registry.is_active(DaemonTimeout::Retry) {
                self.registry
                    .arm_at(DaemonTimeout::Retry, now, duration_to_millis(self.periods.retry));
            }
        } else {
            debug!(job = id, "Job done");
            self.finished.push(id);
        }

        self.registry.arm_at(
            DaemonTimeout::IdleFlush,
            now,
            duration_to_millis(self.periods.idle_flush),
        );
    }

    /// Service every timeout due at `now`.
    pub fn service_expired(&mut self, now: Timestamp) {
        let due: Vec<DaemonTimeout> = self.registry.expired_at(now).collect();
        for slot in due {
            match slot {
                DaemonTimeout::Heartbeat => {
                    self.stats.heartbeats += 1;
                    info!(
                        uptime_ms = now.as_millis(),
                        pending_retries = self.failed.len(),
                        unflushed = self.finished.len(),
                        "Heartbeat"
                    );
                    self.registry.arm_at(
                        DaemonTimeout::Heartbeat,
                        now,
                        duration_to_millis(self.periods.heartbeat),
                    );
                }
                DaemonTimeout::Retry => {
                    self.registry.disarm(DaemonTimeout::Retry);
                    for id in self.failed.drain(..) {
                        debug!(job = id, "Retried job succeeded");
                        self.finished.push(id);
                    }
                }
                DaemonTimeout::IdleFlush => {
                    self.registry.disarm(DaemonTimeout::IdleFlush);
                    self.flush();
                }
            }
        }
    }

    fn flush(&mut self) {
        if self.finished.is_empty() {
            return;
        }
        self.stats.flushes += 1;
        self.stats.flushed_jobs += self.finished.len() as u64;
        info!(jobs = self.finished.len(), "Flushing finished jobs");
        self.finished.clear();
    }

    fn reload(&mut self, now: Timestamp) {
        let Some(reloader) = self.reloader.as_mut() else {
            warn!("Reload requested but no reloader installed");
            return;
        };

        match reloader() {
            Ok(config) => {
                self.calculator = SleepCalculator::from_config(&config);
                self.periods = config.daemon;
                // New heartbeat period takes effect immediately
                self.registry.arm_at(
                    DaemonTimeout::Heartbeat,
                    now,
                    duration_to_millis(self.periods.heartbeat),
                );
                info!(
                    slippage_ms = self.calculator.slippage().as_millis(),
                    "Configuration reloaded"
                );
            }
            Err(e) => warn!(error = %e, "Reload failed, keeping current configuration"),
        }
    }
}
