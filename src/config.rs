//! Configuration file model, loading and validation.
//!
//! Every field is optional so that a file only needs to carry what it
//! overrides. Effective values are resolved as CLI > config file > default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::battery::sysfs::DEFAULT_STATUS_PATH;
use crate::battery::BatteryMode;
use crate::error::ConfigError;
use crate::process::procfs::DEFAULT_PROC_ROOT;
use crate::process::{ProcessFilter, DEFAULT_MAX_ANCESTRY_DEPTH};

pub const DEFAULT_INTERVAL_MS: u64 = 100;
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Locations probed when no config path is given.
pub const DEFAULT_CONFIG_PATHS: [&str; 6] = [
    "/etc/cpugate/cpugate.yaml",
    "/etc/cpugate/cpugate.yml",
    "/etc/cpugate/cpugate.json",
    "./cpugate.yaml",
    "./cpugate.yml",
    "./cpugate.json",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Target selection
    pub pid: Option<u32>,
    pub exe: Option<String>,
    #[serde(alias = "include-children")]
    pub include_children: Option<bool>,
    #[serde(alias = "max-ancestry-depth")]
    pub max_ancestry_depth: Option<usize>,

    // Control loop
    #[serde(alias = "interval-ms")]
    pub interval_ms: Option<u64>,
    pub battery: Option<BatteryMode>,

    // Platform sources
    #[serde(alias = "proc-root")]
    pub proc_root: Option<PathBuf>,
    #[serde(alias = "battery-status-path")]
    pub battery_status_path: Option<PathBuf>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pid: None,
            exe: None,
            include_children: Some(false),
            max_ancestry_depth: Some(DEFAULT_MAX_ANCESTRY_DEPTH),
            interval_ms: Some(DEFAULT_INTERVAL_MS),
            battery: Some(BatteryMode::Ignored),
            proc_root: Some(PathBuf::from(DEFAULT_PROC_ROOT)),
            battery_status_path: Some(PathBuf::from(DEFAULT_STATUS_PATH)),
            log_level: Some(DEFAULT_LOG_LEVEL.into()),
        }
    }
}

impl Config {
    /// Target filter, or `None` when neither pid nor exe is configured.
    pub fn filter(&self) -> Option<ProcessFilter> {
        let include_children = self.include_children.unwrap_or(false);
        if let Some(pid) = self.pid {
            return Some(ProcessFilter::pid(pid).with_children(include_children));
        }
        self.exe
            .as_ref()
            .map(|exe| ProcessFilter::name(exe.clone()).with_children(include_children))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.unwrap_or(DEFAULT_INTERVAL_MS))
    }

    pub fn battery_mode(&self) -> BatteryMode {
        self.battery.unwrap_or_default()
    }

    pub fn max_ancestry_depth(&self) -> usize {
        self.max_ancestry_depth.unwrap_or(DEFAULT_MAX_ANCESTRY_DEPTH)
    }

    pub fn proc_root(&self) -> PathBuf {
        self.proc_root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PROC_ROOT))
    }

    pub fn battery_status_path(&self) -> PathBuf {
        self.battery_status_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATUS_PATH))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.pid.is_some() && cfg.exe.is_some() {
        return Err(ConfigError::Invalid(
            "pid and exe are mutually exclusive, set only one".into(),
        ));
    }
    if cfg.pid == Some(0) {
        return Err(ConfigError::Invalid("pid must be positive".into()));
    }
    if cfg.exe.as_deref().is_some_and(|e| e.trim().is_empty()) {
        return Err(ConfigError::Invalid("exe must not be empty".into()));
    }
    if cfg.interval_ms == Some(0) {
        return Err(ConfigError::Invalid("interval_ms must be greater than 0".into()));
    }
    if cfg.max_ancestry_depth == Some(0) {
        return Err(ConfigError::Invalid(
            "max_ancestry_depth must be at least 1".into(),
        ));
    }
    if let Some(level) = cfg.log_level.as_deref() {
        if !LOG_LEVELS.contains(&level) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log_level '{}', expected one of {}",
                level,
                LOG_LEVELS.join(", ")
            )));
        }
    }
    Ok(())
}

/// Loads a config file, or the first existing default location when `path`
/// is `None`. Falls back to defaults when no file exists.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match DEFAULT_CONFIG_PATHS.iter().find(|p| Path::new(p).exists()) {
            Some(p) => PathBuf::from(p),
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let config = parse_config(&path, &content)?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Parses config content, picking the format from the file extension.
pub fn parse_config(path: &Path, content: &str) -> Result<Config, ConfigError> {
    let parse_err = |reason: String| ConfigError::Parse {
        path: path.to_path_buf(),
        reason,
    };

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
        Some("toml") => toml::from_str(content).map_err(|e| parse_err(e.to_string())),
        _ => serde_yaml::from_str(content).map_err(|e| parse_err(e.to_string())),
    }
}
