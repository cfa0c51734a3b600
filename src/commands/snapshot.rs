//! Snapshot command implementation.
//!
//! Prints the matching processes after `samples` enumeration passes, so the
//! usage column reflects the last interval rather than the first-pass zero.

use anyhow::{anyhow, Result};
use cpugate::process::default_source;
use cpugate::{Config, ProcessFilter, ProcessMonitor, ProcessSnapshot};
use std::fmt::Write as FmtWrite;
use std::thread;
use tracing::debug;

/// Formats one pass as a plain-text table.
pub fn render_table(processes: &[ProcessSnapshot]) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "{:>7} {:>7} {:>12} {:>10} {:>7} {:>2}  {}",
        "PID", "PPID", "START", "TICKS", "CPU%", "Z", "EXECUTABLE"
    )
    .ok();

    for p in processes {
        let exe = if p.executable_path.as_os_str().is_empty() {
            "?".to_string()
        } else {
            p.executable_path.display().to_string()
        };
        writeln!(
            out,
            "{:>7} {:>7} {:>12} {:>10} {:>7.1} {:>2}  {}",
            p.pid,
            p.parent_pid,
            p.start_time,
            p.cpu_time_ticks,
            p.cpu_usage * 100.0,
            if p.is_zombie { "Z" } else { "" },
            exe
        )
        .ok();
    }
    out
}

pub fn command_snapshot(config: &Config, all: bool, samples: usize) -> Result<()> {
    let filter = if all {
        ProcessFilter::all()
    } else {
        config
            .filter()
            .ok_or_else(|| anyhow!("No target configured: set --pid or --exe, or use --all"))?
    };

    let mut monitor = ProcessMonitor::new(default_source(&config.proc_root()))
        .with_max_ancestry_depth(config.max_ancestry_depth());

    let passes = samples.max(1);
    let mut last = Vec::new();
    for pass in 1..=passes {
        let mut processes: Vec<ProcessSnapshot> = monitor.open(&filter)?.collect();
        processes.sort_by_key(|p| p.pid);
        debug!("Pass {}/{}: {} processes", pass, passes, processes.len());
        last = processes;

        if pass < passes {
            thread::sleep(config.interval());
        }
    }

    print!("{}", render_table(&last));
    println!("{} process(es) from {}", last.len(), monitor.source_name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_render_table_marks_zombies_and_unresolved() {
        let rows = vec![
            ProcessSnapshot {
                pid: 10,
                parent_pid: 1,
                start_time: 99,
                cpu_time_ticks: 400,
                cpu_usage: 0.25,
                is_zombie: false,
                executable_path: PathBuf::from("/usr/bin/yes"),
            },
            ProcessSnapshot {
                pid: 11,
                parent_pid: 10,
                start_time: 100,
                cpu_time_ticks: 0,
                cpu_usage: 0.0,
                is_zombie: true,
                executable_path: PathBuf::new(),
            },
        ];
        let table = render_table(&rows);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("25.0"));
        assert!(lines[1].ends_with("/usr/bin/yes"));
        assert!(lines[2].contains(" Z "));
        assert!(lines[2].ends_with('?'));
    }
}
