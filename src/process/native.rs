//! Process table backend for hosts without procfs, built on `sysinfo`.
//!
//! One `System` is kept for the lifetime of the source. Each pass refreshes
//! pid, parent, status, start time, accumulated CPU time and the executable
//! path; ancestry lookups during the pass answer from that refreshed table.

use std::cell::RefCell;
use std::path::PathBuf;
use std::time::Instant;
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};
use tracing::debug;

use super::{ProcessSource, RawProcess};
use crate::error::ProcessError;

const SOURCE_NAME: &str = "sysinfo";

/// Converts accumulated CPU milliseconds into clock ticks.
pub fn millis_to_ticks(millis: u64, ticks_per_second: f64) -> u64 {
    (millis as f64 * ticks_per_second / 1000.0).round() as u64
}

fn refresh_kind() -> ProcessRefreshKind {
    ProcessRefreshKind::nothing()
        .with_cpu()
        .with_exe(UpdateKind::OnlyIfNotSet)
}

fn to_raw(pid: Pid, process: &Process, ticks_per_second: f64, sampled_at: Instant) -> RawProcess {
    // The executable can be unreadable for other users' processes
    let executable_path = match process.exe() {
        Some(exe) => exe.to_path_buf(),
        None => PathBuf::from(process.name()),
    };

    RawProcess {
        pid: pid.as_u32(),
        parent_pid: process.parent().map_or(0, |p| p.as_u32()),
        start_time: process.start_time(),
        cpu_time_ticks: millis_to_ticks(process.accumulated_cpu_time(), ticks_per_second),
        is_zombie: matches!(process.status(), ProcessStatus::Zombie),
        executable_path,
        sampled_at,
    }
}

/// Kernel process table as exposed by `sysinfo`.
pub struct SysinfoSource {
    system: RefCell<System>,
    ticks_per_second: f64,
}

impl SysinfoSource {
    pub fn new(ticks_per_second: f64) -> Self {
        Self {
            system: RefCell::new(System::new()),
            ticks_per_second,
        }
    }
}

impl ProcessSource for SysinfoSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn check(&self) -> Result<(), ProcessError> {
        if sysinfo::IS_SUPPORTED_SYSTEM {
            Ok(())
        } else {
            Err(ProcessError::unavailable(
                SOURCE_NAME,
                "process listing is not supported on this platform",
            ))
        }
    }

    fn scan(&self) -> Result<Box<dyn Iterator<Item = RawProcess> + '_>, ProcessError> {
        self.check()?;

        let mut system = self.system.borrow_mut();
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh_kind());
        let sampled_at = Instant::now();

        let rows: Vec<RawProcess> = system
            .processes()
            .iter()
            .map(|(pid, process)| to_raw(*pid, process, self.ticks_per_second, sampled_at))
            .collect();
        if rows.is_empty() {
            return Err(ProcessError::unavailable(SOURCE_NAME, "no processes visible"));
        }

        debug!("Refreshed {} processes", rows.len());
        Ok(Box::new(rows.into_iter()))
    }

    fn read(&self, pid: u32) -> Option<RawProcess> {
        let pid = Pid::from_u32(pid);
        let mut system = self.system.borrow_mut();
        system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, refresh_kind());
        let sampled_at = Instant::now();

        system
            .process(pid)
            .map(|process| to_raw(pid, process, self.ticks_per_second, sampled_at))
    }

    fn lookup(&self, pid: u32) -> Option<RawProcess> {
        let pid = Pid::from_u32(pid);
        let system = self.system.borrow();
        system
            .process(pid)
            .map(|process| to_raw(pid, process, self.ticks_per_second, Instant::now()))
    }
}
