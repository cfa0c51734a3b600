//! Error types for the process provider, the battery gate and configuration.
//!
//! Per-process read failures are never represented here: a process that
//! vanishes mid-enumeration is skipped, not reported.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the process snapshot provider at `open` time.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// The whole process table could not be read.
    #[error("process table {source_name} unavailable: {reason}")]
    IterationUnavailable {
        source_name: String,
        reason: String,
    },
}

impl ProcessError {
    pub fn unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        ProcessError::IterationUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors raised by a power probe. The gate logs these and fails open.
#[derive(Error, Debug)]
pub enum BatteryError {
    #[error("power source unavailable: {0}")]
    Unavailable(String),

    #[error("malformed power source output: {0}")]
    Malformed(String),
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
