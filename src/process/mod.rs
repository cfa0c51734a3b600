//! Process snapshot provider.
//!
//! A [`ProcessMonitor`] owns one platform [`ProcessSource`] and the CPU
//! baselines of every process it has reported. Each call to
//! [`ProcessMonitor::open`] yields a [`ProcessIter`]: a lazy, single-pass view
//! of the process table at that moment, filtered by pid or executable name and
//! optionally extended to descendants.

pub mod native;
pub mod procfs;

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, trace};

use crate::clock;
use crate::cpu::{CpuHistory, CpuSample};
use crate::error::ProcessError;

pub use native::SysinfoSource;
pub use procfs::ProcfsSource;

/// Maximum number of parent links followed when matching descendants.
pub const DEFAULT_MAX_ANCESTRY_DEPTH: usize = 64;

/// Process attributes as read from the platform, before filtering and
/// usage estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProcess {
    pub pid: u32,
    pub parent_pid: u32,
    pub start_time: u64,
    pub cpu_time_ticks: u64,
    pub is_zombie: bool,
    /// Empty when the path could not be resolved.
    pub executable_path: PathBuf,
    pub sampled_at: Instant,
}

/// One process observed at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub parent_pid: u32,
    pub start_time: u64,
    pub cpu_time_ticks: u64,
    /// Fraction of one core used since the previous observation, in [0, 1].
    pub cpu_usage: f64,
    pub is_zombie: bool,
    pub executable_path: PathBuf,
}

impl ProcessSnapshot {
    fn from_raw(raw: RawProcess, cpu_usage: f64) -> Self {
        Self {
            pid: raw.pid,
            parent_pid: raw.parent_pid,
            start_time: raw.start_time,
            cpu_time_ticks: raw.cpu_time_ticks,
            cpu_usage,
            is_zombie: raw.is_zombie,
            executable_path: raw.executable_path,
        }
    }

    /// Basename of the executable, empty if unresolved.
    pub fn name(&self) -> &str {
        basename(&self.executable_path)
    }
}

/// Selection mode of a [`ProcessFilter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Pid(u32),
    /// Executable basename, or a full path when it contains `/`.
    Name(String),
    All,
}

/// Immutable query applied to every enumerated process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFilter {
    target: Target,
    include_children: bool,
}

impl ProcessFilter {
    pub fn pid(pid: u32) -> Self {
        Self {
            target: Target::Pid(pid),
            include_children: false,
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            target: Target::Name(name.into()),
            include_children: false,
        }
    }

    pub fn all() -> Self {
        Self {
            target: Target::All,
            include_children: false,
        }
    }

    pub fn with_children(mut self, include_children: bool) -> Self {
        self.include_children = include_children;
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn include_children(&self) -> bool {
        self.include_children
    }

    /// Whether `process` itself is selected, ignoring ancestry.
    pub fn matches_direct(&self, process: &RawProcess) -> bool {
        match &self.target {
            Target::Pid(pid) => process.pid == *pid,
            Target::Name(name) => executable_matches(&process.executable_path, name),
            Target::All => true,
        }
    }
}

fn basename(path: &Path) -> &str {
    path.file_name().and_then(|s| s.to_str()).unwrap_or("")
}

fn executable_matches(path: &Path, wanted: &str) -> bool {
    if path.as_os_str().is_empty() || wanted.is_empty() {
        return false;
    }
    if wanted.contains('/') {
        path == Path::new(wanted)
    } else {
        basename(path) == wanted
    }
}

/// A platform process table.
///
/// Reads of individual processes return `None` when the process is gone or
/// unreadable; only a failure to read the table as a whole is an error.
pub trait ProcessSource {
    /// Human-readable name used in errors and logs.
    fn name(&self) -> &str;

    /// Fails when the table cannot be read at all.
    fn check(&self) -> Result<(), ProcessError> {
        Ok(())
    }

    /// Opens a fresh view of the whole table.
    fn scan(&self) -> Result<Box<dyn Iterator<Item = RawProcess> + '_>, ProcessError>;

    /// Reads one process directly from the platform.
    fn read(&self, pid: u32) -> Option<RawProcess>;

    /// Reads one process while a scan is in progress; backends that snapshot
    /// the whole table at `scan` time answer from that snapshot.
    fn lookup(&self, pid: u32) -> Option<RawProcess> {
        self.read(pid)
    }
}

/// Selects the process table backend for the running platform.
pub fn default_source(proc_root: &Path) -> Box<dyn ProcessSource> {
    #[cfg(target_os = "linux")]
    {
        Box::new(ProcfsSource::new(proc_root))
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = proc_root;
        Box::new(SysinfoSource::new(clock::ticks_per_second()))
    }
}

/// Owns a process source and the CPU baselines across enumeration passes.
pub struct ProcessMonitor {
    source: Box<dyn ProcessSource>,
    history: CpuHistory,
    ticks_per_second: f64,
    max_ancestry_depth: usize,
}

impl ProcessMonitor {
    pub fn new(source: Box<dyn ProcessSource>) -> Self {
        Self {
            source,
            history: CpuHistory::new(),
            ticks_per_second: clock::ticks_per_second(),
            max_ancestry_depth: DEFAULT_MAX_ANCESTRY_DEPTH,
        }
    }

    pub fn with_ticks_per_second(mut self, ticks_per_second: f64) -> Self {
        self.ticks_per_second = ticks_per_second;
        self
    }

    pub fn with_max_ancestry_depth(mut self, depth: usize) -> Self {
        self.max_ancestry_depth = depth;
        self
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn ticks_per_second(&self) -> f64 {
        self.ticks_per_second
    }

    /// Number of processes with a recorded CPU baseline.
    pub fn tracked(&self) -> usize {
        self.history.len()
    }

    /// Starts one enumeration pass over the current process table.
    pub fn open(&mut self, filter: &ProcessFilter) -> Result<ProcessIter<'_>, ProcessError> {
        let source: &dyn ProcessSource = &*self.source;

        let rows: Box<dyn Iterator<Item = RawProcess> + '_>;
        let full_scan;
        match filter.target() {
            Target::Pid(pid) if !filter.include_children() => {
                source.check()?;
                rows = Box::new(source.read(*pid).into_iter());
                full_scan = false;
            }
            _ => {
                rows = source.scan()?;
                full_scan = true;
            }
        }

        debug!(
            "Opened {} for {:?} (full scan: {})",
            source.name(),
            filter,
            full_scan
        );

        Ok(ProcessIter {
            rows,
            source,
            filter: filter.clone(),
            history: &mut self.history,
            ticks_per_second: self.ticks_per_second,
            max_ancestry_depth: self.max_ancestry_depth,
            seen: HashSet::new(),
            links: HashMap::new(),
            full_scan,
            exhausted: false,
        })
    }
}

/// Single-pass handle over one view of the process table.
///
/// Dropping the handle releases the underlying OS resources; [`close`] is
/// the explicit form of the same.
///
/// [`close`]: ProcessIter::close
pub struct ProcessIter<'a> {
    rows: Box<dyn Iterator<Item = RawProcess> + 'a>,
    source: &'a dyn ProcessSource,
    filter: ProcessFilter,
    history: &'a mut CpuHistory,
    ticks_per_second: f64,
    max_ancestry_depth: usize,
    seen: HashSet<u32>,
    /// Parent links resolved during this pass, `None` for vanished pids.
    links: HashMap<u32, Option<Link>>,
    full_scan: bool,
    exhausted: bool,
}

impl ProcessIter<'_> {
    pub fn close(self) {}

    fn matches(&mut self, process: &RawProcess) -> bool {
        if self.filter.matches_direct(process) {
            return true;
        }
        self.filter.include_children() && self.has_matching_ancestor(process)
    }

    /// Parent link of `pid`, read from the source at most once per pass.
    fn link(&mut self, pid: u32) -> Option<Link> {
        if let Some(cached) = self.links.get(&pid) {
            return *cached;
        }
        let link = self.source.lookup(pid).map(|p| Link::of(&p, &self.filter));
        self.links.insert(pid, link);
        link
    }

    /// Walks parent links, bounded so a cyclic table cannot loop forever.
    fn has_matching_ancestor(&mut self, process: &RawProcess) -> bool {
        let mut current = process.pid;
        let mut parent = process.parent_pid;

        for _ in 0..self.max_ancestry_depth {
            if parent == 0 || parent == current {
                return false;
            }
            if let Target::Pid(pid) = self.filter.target() {
                if parent == *pid {
                    return true;
                }
            }

            let link = match self.link(parent) {
                Some(link) => link,
                None => return false,
            };
            if link.matches {
                return true;
            }

            current = parent;
            parent = link.parent_pid;
        }

        trace!(
            "Ancestry walk for pid {} stopped at depth {}",
            process.pid,
            self.max_ancestry_depth
        );
        false
    }
}

#[derive(Debug, Clone, Copy)]
struct Link {
    parent_pid: u32,
    matches: bool,
}

impl Link {
    fn of(process: &RawProcess, filter: &ProcessFilter) -> Self {
        Self {
            parent_pid: process.parent_pid,
            matches: filter.matches_direct(process),
        }
    }
}

impl Iterator for ProcessIter<'_> {
    type Item = ProcessSnapshot;

    fn next(&mut self) -> Option<ProcessSnapshot> {
        loop {
            let raw = match self.rows.next() {
                Some(raw) => raw,
                None => {
                    self.exhausted = true;
                    return None;
                }
            };

            if self.filter.include_children() {
                let link = Link::of(&raw, &self.filter);
                self.links.entry(raw.pid).or_insert(Some(link));
            }
            if !self.matches(&raw) {
                continue;
            }
            if !self.seen.insert(raw.pid) {
                debug!("Skipping duplicate pid {} in one pass", raw.pid);
                continue;
            }

            let sample = CpuSample {
                ticks: raw.cpu_time_ticks,
                at: raw.sampled_at,
            };
            let usage = self
                .history
                .observe(raw.pid, raw.start_time, sample, self.ticks_per_second);

            return Some(ProcessSnapshot::from_raw(raw, usage));
        }
    }
}

impl Drop for ProcessIter<'_> {
    fn drop(&mut self) {
        if self.full_scan && self.exhausted {
            self.history.retain(&self.seen);
        }
    }
}
