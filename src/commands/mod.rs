//! CLI command implementations for cpugate.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: Platform source validation
//! - `config`: Configuration file generation
//! - `snapshot`: One-shot process listing
//! - `battery`: One gate decision
//! - `watch`: The control loop

pub mod battery;
pub mod check;
pub mod config;
pub mod snapshot;
pub mod watch;

// Re-export command functions
pub use battery::command_battery;
pub use check::command_check;
pub use config::command_config;
pub use snapshot::command_snapshot;
pub use watch::command_watch;
