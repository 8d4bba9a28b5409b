//! Integration tests for sleep scheduler acceptance testing.

mod common;
mod config_test;
mod event_loop_test;
mod scenario_test;
mod wall_clock_test;
