//! CLI arguments and subcommands for cpugate.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use cpugate::BatteryMode;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "cpugate",
    about = "Process snapshots and battery-aware gating for per-process CPU throttling",
    long_about = "Process snapshots and battery-aware gating for per-process CPU throttling.\n\n\
                  Enumerates a target process (and optionally its descendants), estimates \
                  its CPU usage every tick, and decides whether throttling should be held \
                  off while the battery is not charging or not full.",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Target process id
    #[arg(short = 'p', long, conflicts_with = "exe")]
    pub pid: Option<u32>,

    /// Target executable name (basename) or absolute path
    #[arg(short = 'e', long)]
    pub exe: Option<String>,

    /// Also match descendants of the target
    #[arg(short = 'i', long)]
    pub include_children: bool,

    /// Hold off throttling until the battery is charging or full
    #[arg(short = 'b', long, value_enum)]
    pub battery: Option<BatteryMode>,

    /// Control-loop tick in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Maximum parent links followed when matching descendants
    #[arg(long)]
    pub max_ancestry_depth: Option<usize>,

    /// Root of the proc filesystem (Linux)
    #[arg(long)]
    pub proc_root: Option<PathBuf>,

    /// Battery status attribute (Linux)
    #[arg(long)]
    pub battery_status_path: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and platform sources
    Check,

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Print one snapshot of the matching processes
    Snapshot {
        /// Ignore the target and list every process
        #[arg(long)]
        all: bool,

        /// Number of enumeration passes, one interval apart
        #[arg(short = 'n', long, default_value_t = 2)]
        samples: usize,
    },

    /// Sample the power source once and print the gate decision
    Battery,

    /// Run the control loop: usage and gate decision every tick
    Watch {
        /// Stop after N ticks
        #[arg(short = 'n', long)]
        iterations: Option<usize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_and_exe_conflict() {
        let res = Args::try_parse_from(["cpugate", "--pid", "1", "--exe", "yes"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_watch_with_battery_mode() {
        let args = Args::try_parse_from(["cpugate", "-e", "yes", "-b", "full", "watch", "-n", "3"])
            .unwrap();
        assert_eq!(args.exe.as_deref(), Some("yes"));
        assert_eq!(args.battery, Some(BatteryMode::Full));
        assert!(matches!(
            args.command,
            Some(Commands::Watch {
                iterations: Some(3)
            })
        ));
    }
}
