//! cpugate command-line entry point.
//!
//! Resolves the effective configuration (CLI > config file > defaults),
//! initializes logging and dispatches to the subcommands. Without a
//! subcommand the control loop (`watch`) runs.

use anyhow::{Context, Result};
use clap::Parser;
use cpugate::config::{load_config, validate_effective_config};
use cpugate::Config;
use tracing::{debug, error, info};
use tracing_subscriber::filter::LevelFilter;

mod cli;
mod commands;

use cli::{Args, Commands};
use commands::config::render_config;
use commands::{command_battery, command_check, command_config, command_snapshot, command_watch};

/// Merges the config file (unless disabled) with CLI overrides.
fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    // A target on the CLI replaces the file's target entirely
    if let Some(pid) = args.pid {
        config.pid = Some(pid);
        config.exe = None;
    }
    if let Some(exe) = &args.exe {
        config.exe = Some(exe.clone());
        config.pid = None;
    }
    if args.include_children {
        config.include_children = Some(true);
    }

    if args.battery.is_some() {
        config.battery = args.battery;
    }
    if args.interval_ms.is_some() {
        config.interval_ms = args.interval_ms;
    }
    if args.max_ancestry_depth.is_some() {
        config.max_ancestry_depth = args.max_ancestry_depth;
    }
    if let Some(root) = &args.proc_root {
        config.proc_root = Some(root.clone());
    }
    if let Some(path) = &args.battery_status_path {
        config.battery_status_path = Some(path.clone());
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }

    Ok(config)
}

fn parse_level(level: &str) -> LevelFilter {
    match level {
        "off" => LevelFilter::OFF,
        "error" => LevelFilter::ERROR,
        "warn" => LevelFilter::WARN,
        "debug" => LevelFilter::DEBUG,
        "trace" => LevelFilter::TRACE,
        _ => LevelFilter::INFO,
    }
}

fn setup_logging(config: &Config) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(parse_level(config.log_level()))
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    debug!("Logging initialized with level: {}", config.log_level());
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        println!("{}", render_config(&config, args.config_format)?);
        return Ok(());
    }

    let config = resolve_config(&args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    setup_logging(&config)?;

    let result = match args.command {
        Some(Commands::Check) => command_check(&config),
        Some(Commands::Config {
            output,
            format,
            commented,
        }) => command_config(output, format, commented),
        Some(Commands::Snapshot { all, samples }) => command_snapshot(&config, all, samples),
        Some(Commands::Battery) => command_battery(&config),
        Some(Commands::Watch { iterations }) => command_watch(&config, iterations),
        None => {
            info!("No subcommand given, running watch");
            command_watch(&config, None)
        }
    };

    if let Err(e) = &result {
        error!("Command failed: {:#}", e);
    }
    result
}
