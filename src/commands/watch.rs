//! Watch command implementation.
//!
//! Runs the observation loop a throttler sits on: each tick asks the battery
//! gate whether to stand down, otherwise enumerates the target processes and
//! reports their combined usage.

use anyhow::{anyhow, Result};
use cpugate::battery::default_probe;
use cpugate::process::default_source;
use cpugate::{should_pause, BatteryStatus, Config, ProcessMonitor, ProcessSnapshot};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Aggregate view of one enumeration pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassSummary {
    pub live: usize,
    pub zombies: usize,
    /// Sum of per-process usage, may exceed 1.0 on multi-core hosts.
    pub usage: f64,
}

/// Folds one pass into a summary, skipping our own process.
pub fn summarize(pass: &[ProcessSnapshot], own_pid: u32) -> PassSummary {
    pass.iter()
        .filter(|p| p.pid != own_pid)
        .fold(PassSummary::default(), |mut acc, p| {
            if p.is_zombie {
                acc.zombies += 1;
            } else {
                acc.live += 1;
                acc.usage += p.cpu_usage;
            }
            acc
        })
}

pub fn command_watch(config: &Config, iterations: Option<usize>) -> Result<()> {
    let filter = config
        .filter()
        .ok_or_else(|| anyhow!("No target configured: set --pid or --exe"))?;

    let mut monitor = ProcessMonitor::new(default_source(&config.proc_root()))
        .with_max_ancestry_depth(config.max_ancestry_depth());
    let mut probe = default_probe(&config.battery_status_path());
    let mut status = BatteryStatus::new(config.battery_mode());
    let own_pid = std::process::id();
    let interval = config.interval();

    info!(
        "Watching {:?} (children: {}) every {:?} via {}, battery mode {}",
        filter.target(),
        filter.include_children(),
        interval,
        monitor.source_name(),
        status.mode()
    );

    let mut last_report: Option<Instant> = None;
    let mut tick = 0usize;
    loop {
        if iterations.is_some_and(|n| tick >= n) {
            debug!("Iteration limit reached after {} ticks", tick);
            break;
        }
        tick += 1;

        if should_pause(&mut status, probe.as_mut()) {
            thread::sleep(interval);
            continue;
        }

        let pass: Vec<ProcessSnapshot> = match monitor.open(&filter) {
            Ok(iter) => iter.collect(),
            Err(e) => {
                warn!("Process enumeration failed: {}", e);
                thread::sleep(interval);
                continue;
            }
        };

        let summary = summarize(&pass, own_pid);
        if summary.live == 0 {
            info!("No live target process remains, stopping");
            break;
        }

        if last_report.map_or(true, |at| at.elapsed() >= REPORT_INTERVAL) {
            println!(
                "{:>4} process(es) {:>6.1}% cpu{}",
                summary.live,
                summary.usage * 100.0,
                if summary.zombies > 0 {
                    format!(" ({} zombie)", summary.zombies)
                } else {
                    String::new()
                }
            );
            last_report = Some(Instant::now());
        }
        debug!(
            "Tick {}: {} live, {} zombie, usage {:.3}, tracked {}",
            tick,
            summary.live,
            summary.zombies,
            summary.usage,
            monitor.tracked()
        );

        thread::sleep(interval);
    }

    Ok(())
}
