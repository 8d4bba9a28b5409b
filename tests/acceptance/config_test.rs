//! Loading scheduler configuration from disk.

use sched_common::config::{ConfigError, SchedulerConfig};
use sched_core::SleepCalculator;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_config_file_sets_slippage() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
slippage = "7ms"

[daemon]
heartbeat = "10s"
"#
    )
    .unwrap();

    let config = SchedulerConfig::from_file(file.path()).unwrap();
    assert_eq!(config.daemon.heartbeat, Duration::from_secs(10));

    let calculator = SleepCalculator::from_config(&config);
    assert_eq!(calculator.slippage(), Duration::from_millis(7));
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[daemon]\nidle_flush = \"0s\"").unwrap();

    let err = SchedulerConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Invalid {
            field: "daemon.idle_flush",
            ..
        }
    ));
}

#[test]
fn test_dumped_config_reloads() {
    let config = SchedulerConfig::default();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(config.to_toml().unwrap().as_bytes()).unwrap();

    assert_eq!(SchedulerConfig::from_file(file.path()).unwrap(), config);
}
