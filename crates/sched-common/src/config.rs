//! Configuration structures for the sleep scheduler.
//!
//! Supports TOML deserialization with sensible defaults. Durations use
//! humantime notation (`"3ms"`, `"1s"`, `"2m 30s"`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default wake-up margin added to every computed sleep.
pub const DEFAULT_SLIPPAGE: Duration = Duration::from_millis(3);

/// Largest slippage accepted by [`SchedulerConfig::validate`].
pub const MAX_SLIPPAGE: Duration = Duration::from_secs(1);

/// Top-level scheduler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Margin added to computed sleep durations so the caller wakes
    /// strictly after the deadline rather than at or before it.
    #[serde(with = "humantime_serde")]
    pub slippage: Duration,

    /// Demonstration daemon settings.
    pub daemon: DaemonConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            slippage: DEFAULT_SLIPPAGE,
            daemon: DaemonConfig::default(),
        }
    }
}

/// Timeout periods and workload for the demonstration daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Heartbeat period.
    #[serde(with = "humantime_serde")]
    pub heartbeat: Duration,

    /// Delay before retrying a failed work item.
    #[serde(with = "humantime_serde")]
    pub retry: Duration,

    /// Idle time after the last work item before buffered results are flushed.
    #[serde(with = "humantime_serde")]
    pub idle_flush: Duration,

    /// Interval between items pushed by the simulated producer.
    /// Zero disables the producer.
    #[serde(with = "humantime_serde")]
    pub producer_interval: Duration,

    /// Stop after this many wake-ups (0 = run until signalled).
    pub max_wakeups: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(1),
            retry: Duration::from_millis(250),
            idle_flush: Duration::from_secs(5),
            producer_interval: Duration::from_millis(700),
            max_wakeups: 0,
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or fails validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check values that deserialize fine but make no sense at runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slippage > MAX_SLIPPAGE {
            return Err(ConfigError::Invalid {
                field: "slippage",
                reason: format!(
                    "{} exceeds the {} maximum",
                    humantime::format_duration(self.slippage),
                    humantime::format_duration(MAX_SLIPPAGE)
                ),
            });
        }

        let periodic = [
            ("daemon.heartbeat", self.daemon.heartbeat),
            ("daemon.retry", self.daemon.retry),
            ("daemon.idle_flush", self.daemon.idle_flush),
        ];
        for (field, period) in periodic {
            if period.is_zero() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "period must be non-zero".into(),
                });
            }
        }

        Ok(())
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but is out of its accepted range.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Dotted field path.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
