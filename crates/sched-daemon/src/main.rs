//! Sleep scheduler daemon entry point.
//!
//! Runs a single-threaded event loop that sleeps exactly as long as its
//! nearest timeout allows, woken early by a simulated producer thread or
//! by signals.

mod event_loop;
mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use sched_common::config::SchedulerConfig;
use sched_common::time::MonotonicClock;
use sched_core::WorkQueue;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::event_loop::{Event, EventLoop};
use crate::signals::{SignalHandler, SignalKind};

/// Environment variable naming a configuration file.
const CONFIG_ENV: &str = "SLEEP_SCHED_CONFIG";

/// Configuration file used during local development.
const LOCAL_CONFIG: &str = "config/default.toml";

/// Sleep scheduler daemon command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "sleep-sched",
    about = "Power-aware event loop daemon",
    version,
    long_about = None
)]
struct Args {
    /// Path to a scheduler configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Wake-up slippage (overrides config file), e.g. "3ms".
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    slippage: Option<Duration>,

    /// Stop after this many wake-ups (0 = run until signalled).
    #[arg(long, value_name = "COUNT")]
    max_wakeups: Option<u64>,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    dump_config: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    let config_path = config_source(args.config.as_deref());
    let config = load_config(config_path.as_deref(), &args)?;

    if args.dump_config {
        print!("{}", config.to_toml().context("Failed to serialize config")?);
        return Ok(());
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting sleep scheduler daemon");
    info!(
        slippage = %humantime::format_duration(config.slippage),
        heartbeat = %humantime::format_duration(config.daemon.heartbeat),
        "Configuration loaded"
    );

    let queue: Arc<WorkQueue<Event>> = Arc::new(WorkQueue::new());

    // Signals are blocked before any other thread exists
    let signal_queue = Arc::clone(&queue);
    let signal_handler = SignalHandler::install(move |kind| on_signal(&signal_queue, kind))
        .context("Failed to set up signal handlers")?;

    let producer = spawn_producer(Arc::clone(&queue), config.daemon.producer_interval)?;

    let clock = MonotonicClock::probe().context("Monotonic clock unavailable")?;
    let mut event_loop = EventLoop::new(clock, &config, Arc::clone(&queue));
    event_loop.set_reloader(Box::new(move || load_config(config_path.as_deref(), &args)));

    event_loop.run(config.daemon.max_wakeups);
    let stats = event_loop.stats();
    let still_armed = event_loop
        .registry()
        .iter()
        .filter(|(_, state)| state.is_armed())
        .count();

    queue.close();
    if let Some(producer) = producer {
        if producer.join().is_err() {
            warn!("Producer thread panicked");
        }
    }

    info!(
        wakeups = stats.wakeups,
        immediate = stats.immediate,
        jobs = stats.jobs,
        failures = stats.failures,
        heartbeats = stats.heartbeats,
        flushes = stats.flushes,
        flushed_jobs = stats.flushed_jobs,
        still_armed,
        signals = signal_handler.state().signal_count(),
        signalled = signal_handler.shutdown_requested(),
        "Daemon stopped"
    );
    Ok(())
}

/// Initialize logging with the specified log level.
fn init_logging(level: &str) {
    let filter = format!("sched_daemon={level},sched_core={level},sched_common={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

fn on_signal(queue: &WorkQueue<Event>, kind: SignalKind) {
    if kind.is_shutdown() {
        queue.close();
    } else if queue.push(Event::Reload).is_err() {
        debug!("Reload ignored, daemon is shutting down");
    }
}

/// Pick the configuration file to use.
///
/// Resolution priority (first match wins):
/// 1. Command-line `--config` argument
/// 2. `SLEEP_SCHED_CONFIG` environment variable, if the file exists
/// 3. `config/default.toml`, if it exists
///
/// `None` means built-in defaults.
fn config_source(cli: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Some(path);
        }
        warn!(
            path = %env_path,
            "{CONFIG_ENV} set but file does not exist, checking other locations"
        );
    }

    let local = PathBuf::from(LOCAL_CONFIG);
    local.exists().then_some(local)
}

/// Load configuration from `path` (or defaults) and apply CLI overrides.
fn load_config(path: Option<&Path>, args: &Args) -> Result<SchedulerConfig> {
    let mut config = match path {
        Some(path) => {
            info!(config_path = ?path, "Loading config");
            SchedulerConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => {
            info!("No config file found, using built-in defaults");
            SchedulerConfig::default()
        }
    };

    if let Some(slippage) = args.slippage {
        config.slippage = slippage;
    }
    if let Some(max_wakeups) = args.max_wakeups {
        config.daemon.max_wakeups = max_wakeups;
    }
    config.validate().context("Invalid configuration")?;

    Ok(config)
}

/// Start the simulated producer. A zero interval disables it.
fn spawn_producer(
    queue: Arc<WorkQueue<Event>>,
    interval: Duration,
) -> Result<Option<thread::JoinHandle<()>>> {
    if interval.is_zero() {
        info!("Producer disabled");
        return Ok(None);
    }

    let handle = thread::Builder::new()
        .name("sched-producer".into())
        .spawn(move || {
            let mut next_id = 0u64;
            loop {
                thread::sleep(interval);
                if queue.push(Event::Job(next_id)).is_err() {
                    break;
                }
                next_id += 1;
            }
            debug!(produced = next_id, "Producer stopped");
        })
        .context("Failed to spawn producer thread")?;

    Ok(Some(handle))
}
