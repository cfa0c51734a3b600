//! cpugate - process observation and power-state gating for CPU throttling.
//!
//! Two independent pieces feed a throttling control loop:
//! - [`process::ProcessMonitor`] enumerates the processes matching a
//!   [`process::ProcessFilter`] and estimates their CPU usage per pass.
//! - [`battery::should_pause`] tells the loop whether to stand down because
//!   the configured battery condition is not met.

pub mod battery;
pub mod clock;
pub mod config;
pub mod cpu;
pub mod error;
pub mod process;

pub use battery::{should_pause, BatteryMode, BatteryStatus, PowerProbe, PowerReading};
pub use config::Config;
pub use error::{BatteryError, ConfigError, ProcessError};
pub use process::{ProcessFilter, ProcessIter, ProcessMonitor, ProcessSnapshot, ProcessSource};
