//! Linux power source: `/sys/class/power_supply/BAT0/status`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{BatteryMode, PowerProbe, PowerReading};
use crate::error::BatteryError;

pub const DEFAULT_STATUS_PATH: &str = "/sys/class/power_supply/BAT0/status";

/// Reads the single-line battery status attribute.
#[derive(Debug, Clone)]
pub struct SysfsProbe {
    path: PathBuf,
    label: String,
}

impl SysfsProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = path.display().to_string();
        Self { path, label }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for SysfsProbe {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS_PATH)
    }
}

impl PowerProbe for SysfsProbe {
    fn name(&self) -> &str {
        &self.label
    }

    fn sample(&mut self, mode: BatteryMode) -> Result<PowerReading, BatteryError> {
        let content = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::InvalidData => BatteryError::Malformed(format!("{}: {}", self.label, e)),
            _ => BatteryError::Unavailable(format!("{}: {}", self.label, e)),
        })?;
        Ok(decide(mode, &content))
    }
}

/// Charge level implied by a status string; `None` for anything that does
/// not indicate external power.
fn charge_level(status: &str) -> Option<BatteryMode> {
    match status {
        "Charging" => Some(BatteryMode::Charging),
        "Full" => Some(BatteryMode::Full),
        _ => None,
    }
}

/// Decides from the content of the status file.
///
/// Pauses only when the battery reports external power but has not yet
/// reached the level `mode` requires (charging while full is required).
/// Discharging and unrecognized values never pause; unrecognized values are
/// flagged as an anomaly.
pub fn decide(mode: BatteryMode, content: &str) -> PowerReading {
    let status = content.lines().next().unwrap_or("").trim_end();

    match charge_level(status) {
        Some(level) => PowerReading::new(level < mode, status),
        None if status == "Discharging" => PowerReading::new(false, status),
        None => PowerReading::new(false, status)
            .with_anomaly(format!("unknown battery status {:?}", status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battery::tests::{capture_logs, count_level};
    use crate::battery::{should_pause, should_pause_at, BatteryStatus, SAMPLE_INTERVAL};
    use tempfile::TempDir;

    fn gate(mode: BatteryMode, content: Option<&str>) -> bool {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("status");
        if let Some(content) = content {
            fs::write(&path, content).unwrap();
        }
        let mut probe = SysfsProbe::new(&path);
        let mut status = BatteryStatus::new(mode);
        should_pause(&mut status, &mut probe)
    }

    #[test]
    fn test_charging_satisfies_charging_mode() {
        assert!(!gate(BatteryMode::Charging, Some("Charging\n")));
    }

    #[test]
    fn test_charging_waits_in_full_mode() {
        assert!(gate(BatteryMode::Full, Some("Charging\n")));
    }

    #[test]
    fn test_full_satisfies_both_modes() {
        assert!(!gate(BatteryMode::Charging, Some("Full\n")));
        assert!(!gate(BatteryMode::Full, Some("Full\n")));
    }

    #[test]
    fn test_discharging_never_pauses() {
        assert!(!gate(BatteryMode::Charging, Some("Discharging\n")));
        assert!(!gate(BatteryMode::Full, Some("Discharging\n")));
    }

    #[test]
    fn test_missing_file_fails_open() {
        assert!(!gate(BatteryMode::Charging, None));
        assert!(!gate(BatteryMode::Full, None));
    }

    #[test]
    fn test_unknown_and_empty_content_fail_open() {
        assert!(!gate(BatteryMode::Full, Some("Not charging\n")));
        assert!(!gate(BatteryMode::Full, Some("")));
        assert!(!gate(BatteryMode::Charging, Some("Charg")));
    }

    #[test]
    fn test_missing_file_is_unavailable_error() {
        let tmp = TempDir::new().unwrap();
        let mut probe = SysfsProbe::new(tmp.path().join("BAT0").join("status"));
        assert!(matches!(
            probe.sample(BatteryMode::Charging),
            Err(BatteryError::Unavailable(_))
        ));
    }

    #[test]
    fn test_non_utf8_content_is_malformed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("status");
        fs::write(&path, [0xff, 0xfe, b'\n']).unwrap();
        let mut probe = SysfsProbe::new(&path);
        assert!(matches!(
            probe.sample(BatteryMode::Full),
            Err(BatteryError::Malformed(_))
        ));
        assert!(!should_pause(&mut BatteryStatus::new(BatteryMode::Full), &mut probe));
    }

    #[test]
    fn test_decide_reports_observed_line() {
        let reading = decide(BatteryMode::Full, "Charging\r\nextra\n");
        assert!(reading.pause);
        assert_eq!(reading.observed, "Charging");
        assert!(reading.anomaly.is_none());
    }

    #[test]
    fn test_unknown_status_is_flagged() {
        let reading = decide(BatteryMode::Charging, "Not charging\n");
        assert!(!reading.pause);
        assert_eq!(reading.anomaly.as_deref(), Some("unknown battery status \"Not charging\""));
        assert!(decide(BatteryMode::Charging, "Discharging\n").anomaly.is_none());
    }

    #[test]
    fn test_unknown_status_warns_once_across_samples() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("status");
        fs::write(&path, "Not charging\n").unwrap();
        let mut probe = SysfsProbe::new(&path);
        let mut status = BatteryStatus::new(BatteryMode::Full);
        let t0 = std::time::Instant::now();

        let logs = capture_logs(|| {
            for i in 0..3 {
                assert!(!should_pause_at(&mut status, &mut probe, t0 + SAMPLE_INTERVAL * i));
            }
        });
        assert_eq!(count_level(&logs, "WARN"), 1, "{}", logs);
        assert!(logs.contains("Not charging"));
    }

    #[test]
    fn test_missing_device_warns_once() {
        let tmp = TempDir::new().unwrap();
        let mut probe = SysfsProbe::new(tmp.path().join("BAT0").join("status"));
        let mut status = BatteryStatus::new(BatteryMode::Charging);
        let t0 = std::time::Instant::now();

        let logs = capture_logs(|| {
            for i in 0..3 {
                assert!(!should_pause_at(&mut status, &mut probe, t0 + SAMPLE_INTERVAL * i));
            }
        });
        assert_eq!(count_level(&logs, "WARN"), 1, "{}", logs);
        assert_eq!(count_level(&logs, "DEBUG"), 2, "{}", logs);
    }
}
