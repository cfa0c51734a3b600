//! Linux process table backend reading `/proc/<pid>/*`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

use super::{ProcessSource, RawProcess};
use crate::error::ProcessError;

pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Fields of `/proc/<pid>/stat` used by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatFields {
    pub pid: u32,
    pub state: char,
    pub ppid: u32,
    pub utime: u64,
    pub stime: u64,
    pub start_time: u64,
}

/// Parses one `/proc/<pid>/stat` line.
///
/// The command name in field 2 may contain spaces and parentheses, so the
/// remaining fields are located from the last `)`.
pub fn parse_stat(content: &str) -> Option<StatFields> {
    let open = content.find('(')?;
    let close = content.rfind(')')?;
    if close < open {
        return None;
    }

    let pid = content[..open].trim().parse().ok()?;
    let fields: Vec<&str> = content[close + 1..].split_whitespace().collect();
    if fields.len() < 20 {
        return None;
    }

    Some(StatFields {
        pid,
        state: fields[0].chars().next()?,
        ppid: fields[1].parse().ok()?,
        utime: fields[11].parse().ok()?,
        stime: fields[12].parse().ok()?,
        start_time: fields[19].parse().ok()?,
    })
}

/// Reads the process table from a procfs mount.
#[derive(Debug, Clone)]
pub struct ProcfsSource {
    root: PathBuf,
    label: String,
}

impl ProcfsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let label = root.display().to_string();
        Self { root, label }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for ProcfsSource {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

impl ProcessSource for ProcfsSource {
    fn name(&self) -> &str {
        &self.label
    }

    fn check(&self) -> Result<(), ProcessError> {
        match fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(ProcessError::unavailable(&self.label, "not a directory")),
            Err(e) => Err(ProcessError::unavailable(&self.label, e)),
        }
    }

    fn scan(&self) -> Result<Box<dyn Iterator<Item = RawProcess> + '_>, ProcessError> {
        let entries =
            fs::read_dir(&self.root).map_err(|e| ProcessError::unavailable(&self.label, e))?;

        Ok(Box::new(entries.flatten().filter_map(move |entry| {
            let name = entry.file_name();
            let name = name.to_str()?;
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            self.read(name.parse().ok()?)
        })))
    }

    fn read(&self, pid: u32) -> Option<RawProcess> {
        let dir = self.root.join(pid.to_string());

        let content = match fs::read_to_string(dir.join("stat")) {
            Ok(c) => c,
            Err(e) => {
                debug!("Skipping pid {}: cannot read stat: {}", pid, e);
                return None;
            }
        };
        let sampled_at = Instant::now();

        let stat = match parse_stat(&content) {
            Some(s) => s,
            None => {
                debug!("Skipping pid {}: malformed stat line", pid);
                return None;
            }
        };

        Some(RawProcess {
            pid: stat.pid,
            parent_pid: stat.ppid,
            start_time: stat.start_time,
            cpu_time_ticks: stat.utime.saturating_add(stat.stime),
            is_zombie: stat.state == 'Z',
            executable_path: read_executable(&dir),
            sampled_at,
        })
    }
}

/// Resolves the executable from the `exe` link, falling back to argv[0].
fn read_executable(proc_path: &Path) -> PathBuf {
    if let Ok(target) = fs::read_link(proc_path.join("exe")) {
        let s = target.to_string_lossy();
        return match s.strip_suffix(" (deleted)") {
            Some(stripped) => PathBuf::from(stripped),
            None => target,
        };
    }

    if let Ok(content) = fs::read(proc_path.join("cmdline")) {
        if let Some(first) = content.split(|&b| b == 0u8).next() {
            if let Ok(arg0) = std::str::from_utf8(first) {
                if !arg0.is_empty() {
                    return PathBuf::from(arg0);
                }
            }
        }
    }

    PathBuf::new()
}
