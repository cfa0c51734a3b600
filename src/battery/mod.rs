//! Battery-aware throttle gate.
//!
//! Decides once per control-loop tick whether throttling should be held off
//! because the configured power condition is not met. External sampling is
//! debounced to one read per second; the last decision is reused in between.
//! Every failure to read or understand the power source resolves to "do not
//! pause".

pub mod ioreg;
pub mod sysfs;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::BatteryError;

pub use ioreg::IoregProbe;
pub use sysfs::SysfsProbe;

/// Minimum time between two external samples.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Power condition required before throttling proceeds.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BatteryMode {
    #[default]
    Ignored,
    Charging,
    Full,
}

impl fmt::Display for BatteryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BatteryMode::Ignored => "ignored",
            BatteryMode::Charging => "charging",
            BatteryMode::Full => "full",
        };
        f.write_str(s)
    }
}

/// Result of one external sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerReading {
    pub pause: bool,
    /// What the source reported, for diagnostics.
    pub observed: String,
    /// Set when the source answered with something unexpected. The gate
    /// logs it; `pause` already holds the fail-open decision.
    pub anomaly: Option<String>,
}

impl PowerReading {
    pub fn new(pause: bool, observed: impl Into<String>) -> Self {
        Self {
            pause,
            observed: observed.into(),
            anomaly: None,
        }
    }

    pub fn with_anomaly(mut self, anomaly: impl Into<String>) -> Self {
        self.anomaly = Some(anomaly.into());
        self
    }
}

/// A platform power source.
pub trait PowerProbe {
    fn name(&self) -> &str;

    /// Reads the source once and decides for `mode`. `mode` is never
    /// [`BatteryMode::Ignored`] when called from the gate.
    fn sample(&mut self, mode: BatteryMode) -> Result<PowerReading, BatteryError>;
}

/// Probe for platforms without a supported power source.
#[derive(Debug, Default)]
pub struct UnsupportedProbe;

impl PowerProbe for UnsupportedProbe {
    fn name(&self) -> &str {
        "unsupported"
    }

    fn sample(&mut self, _mode: BatteryMode) -> Result<PowerReading, BatteryError> {
        Err(BatteryError::Unavailable(
            "no power source backend for this platform".into(),
        ))
    }
}

/// Selects the power source backend for the running platform.
pub fn default_probe(status_path: &Path) -> Box<dyn PowerProbe> {
    #[cfg(target_os = "linux")]
    {
        Box::new(SysfsProbe::new(status_path))
    }
    #[cfg(target_os = "macos")]
    {
        let _ = status_path;
        Box::new(IoregProbe::default())
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        let _ = status_path;
        Box::new(UnsupportedProbe)
    }
}

/// Gate state for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct BatteryStatus {
    mode: BatteryMode,
    last_decision: bool,
    last_sample_time: Option<Instant>,
    last_observed: Option<String>,
    /// Last problem logged at warn level, repeated at debug until it changes.
    warned: Option<String>,
}

impl BatteryStatus {
    pub fn new(mode: BatteryMode) -> Self {
        Self {
            mode,
            last_decision: false,
            last_sample_time: None,
            last_observed: None,
            warned: None,
        }
    }

    pub fn mode(&self) -> BatteryMode {
        self.mode
    }

    pub fn last_decision(&self) -> bool {
        self.last_decision
    }

    pub fn last_sample_time(&self) -> Option<Instant> {
        self.last_sample_time
    }

    /// What the power source reported on the last successful sample.
    pub fn last_observed(&self) -> Option<&str> {
        self.last_observed.as_deref()
    }

    /// Warns about `problem` once, then logs it at debug while it persists.
    fn report(&mut self, source: &str, problem: String) {
        if self.warned.as_deref() == Some(problem.as_str()) {
            debug!("{}: {}", source, problem);
        } else {
            warn!("{}: {}; throttling proceeds", source, problem);
            self.warned = Some(problem);
        }
    }
}

/// Returns true when throttling should be held off right now.
pub fn should_pause(status: &mut BatteryStatus, probe: &mut dyn PowerProbe) -> bool {
    should_pause_at(status, probe, Instant::now())
}

/// [`should_pause`] with an explicit clock reading.
pub fn should_pause_at(
    status: &mut BatteryStatus,
    probe: &mut dyn PowerProbe,
    now: Instant,
) -> bool {
    if status.mode == BatteryMode::Ignored {
        return false;
    }

    if let Some(last) = status.last_sample_time {
        if now.saturating_duration_since(last) < SAMPLE_INTERVAL {
            return status.last_decision;
        }
    }
    status.last_sample_time = Some(now);

    let decision = match probe.sample(status.mode) {
        Ok(reading) => {
            debug!(
                "{} reports {:?}, pause={}",
                probe.name(),
                reading.observed,
                reading.pause
            );
            match reading.anomaly {
                Some(anomaly) => status.report(probe.name(), anomaly),
                None => status.warned = None,
            }
            status.last_observed = Some(reading.observed);
            reading.pause
        }
        Err(e) => {
            status.report(probe.name(), e.to_string());
            status.last_observed = None;
            false
        }
    };

    if decision && !status.last_decision {
        info!(
            "Battery is not {}, holding off throttling until it is",
            status.mode
        );
    } else if !decision && status.last_decision {
        debug!("Battery wait for {} ended", status.mode);
    }

    status.last_decision = decision;
    decision
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Log sink shared between a test and its subscriber.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Runs `f` under a thread-local subscriber and returns what it logged.
    pub(crate) fn capture_logs(f: impl FnOnce()) -> String {
        let sink = Captured::default();
        let writer = sink.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, f);
        let bytes = sink.0.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub(crate) fn count_level(logs: &str, level: &str) -> usize {
        logs.lines().filter(|l| l.contains(level)).count()
    }

    struct FakeProbe {
        answers: Vec<Result<bool, ()>>,
        calls: usize,
    }

    impl FakeProbe {
        fn new(answers: Vec<Result<bool, ()>>) -> Self {
            Self { answers, calls: 0 }
        }
    }

    impl PowerProbe for FakeProbe {
        fn name(&self) -> &str {
            "fake"
        }

        fn sample(&mut self, _mode: BatteryMode) -> Result<PowerReading, BatteryError> {
            let answer = self.answers[self.calls.min(self.answers.len() - 1)];
            self.calls += 1;
            match answer {
                Ok(pause) => Ok(PowerReading::new(pause, "fake")),
                Err(()) => Err(BatteryError::Unavailable("gone".into())),
            }
        }
    }

    #[test]
    fn test_ignored_mode_never_samples() {
        let mut status = BatteryStatus::new(BatteryMode::Ignored);
        let mut probe = FakeProbe::new(vec![Ok(true)]);
        let t0 = Instant::now();
        for i in 0..5 {
            assert!(!should_pause_at(
                &mut status,
                &mut probe,
                t0 + Duration::from_secs(i * 2)
            ));
        }
        assert_eq!(probe.calls, 0);
        assert!(status.last_sample_time().is_none());
    }

    #[test]
    fn test_debounce_within_one_second() {
        let mut status = BatteryStatus::new(BatteryMode::Charging);
        let mut probe = FakeProbe::new(vec![Ok(true), Ok(false)]);
        let t0 = Instant::now();

        let first = should_pause_at(&mut status, &mut probe, t0);
        let second = should_pause_at(&mut status, &mut probe, t0 + Duration::from_millis(999));
        assert_eq!(probe.calls, 1);
        assert!(first);
        assert_eq!(first, second);

        let third = should_pause_at(&mut status, &mut probe, t0 + Duration::from_secs(1));
        assert_eq!(probe.calls, 2);
        assert!(!third);
    }

    #[test]
    fn test_back_to_back_real_clock_calls_sample_once() {
        let mut status = BatteryStatus::new(BatteryMode::Full);
        let mut probe = FakeProbe::new(vec![Ok(true), Ok(false)]);
        let a = should_pause(&mut status, &mut probe);
        let b = should_pause(&mut status, &mut probe);
        assert_eq!(probe.calls, 1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_unavailable_source_fails_open() {
        let mut status = BatteryStatus::new(BatteryMode::Full);
        let mut probe = FakeProbe::new(vec![Ok(true), Err(())]);
        let t0 = Instant::now();

        assert!(should_pause_at(&mut status, &mut probe, t0));
        assert!(!should_pause_at(&mut status, &mut probe, t0 + SAMPLE_INTERVAL));
        assert!(status.last_observed().is_none());
        assert!(!status.last_decision());
    }

    #[test]
    fn test_unavailable_source_warns_once() {
        let mut status = BatteryStatus::new(BatteryMode::Charging);
        let mut probe = FakeProbe::new(vec![Err(())]);
        let t0 = Instant::now();

        let logs = capture_logs(|| {
            for i in 0..4 {
                assert!(!should_pause_at(&mut status, &mut probe, t0 + SAMPLE_INTERVAL * i));
            }
        });
        assert_eq!(probe.calls, 4);
        assert_eq!(count_level(&logs, "WARN"), 1, "{}", logs);
        assert!(logs.contains("power source unavailable: gone"));
        assert!(count_level(&logs, "DEBUG") >= 3, "{}", logs);
    }

    #[test]
    fn test_warning_repeats_after_recovery() {
        let mut status = BatteryStatus::new(BatteryMode::Charging);
        let mut probe = FakeProbe::new(vec![Err(()), Ok(false), Err(())]);
        let t0 = Instant::now();

        let logs = capture_logs(|| {
            for i in 0..3 {
                should_pause_at(&mut status, &mut probe, t0 + SAMPLE_INTERVAL * i);
            }
        });
        assert_eq!(count_level(&logs, "WARN"), 2, "{}", logs);
    }

    struct OddProbe;

    impl PowerProbe for OddProbe {
        fn name(&self) -> &str {
            "odd"
        }

        fn sample(&mut self, _mode: BatteryMode) -> Result<PowerReading, BatteryError> {
            Ok(PowerReading::new(false, "Not charging").with_anomaly("unknown battery status"))
        }
    }

    #[test]
    fn test_anomalous_reading_warns_once() {
        let mut status = BatteryStatus::new(BatteryMode::Full);
        let t0 = Instant::now();

        let logs = capture_logs(|| {
            for i in 0..5 {
                assert!(!should_pause_at(&mut status, &mut OddProbe, t0 + SAMPLE_INTERVAL * i));
            }
        });
        assert_eq!(count_level(&logs, "WARN"), 1, "{}", logs);
        assert!(logs.contains("unknown battery status"));
        assert_eq!(status.last_observed(), Some("Not charging"));
    }

    #[test]
    fn test_waiting_notice_logged_on_transition_only() {
        let mut status = BatteryStatus::new(BatteryMode::Full);
        let mut probe = FakeProbe::new(vec![Ok(true), Ok(true), Ok(false), Ok(true)]);
        let t0 = Instant::now();

        let logs = capture_logs(|| {
            for i in 0..4 {
                should_pause_at(&mut status, &mut probe, t0 + SAMPLE_INTERVAL * i);
            }
        });
        assert_eq!(logs.matches("holding off throttling").count(), 2, "{}", logs);
    }

    #[test]
    fn test_independent_statuses() {
        let t0 = Instant::now();
        let mut a = BatteryStatus::new(BatteryMode::Charging);
        let mut b = BatteryStatus::new(BatteryMode::Charging);
        let mut probe = FakeProbe::new(vec![Ok(true)]);

        should_pause_at(&mut a, &mut probe, t0);
        should_pause_at(&mut b, &mut probe, t0);
        assert_eq!(probe.calls, 2);
    }

    #[test]
    fn test_unsupported_probe_fails_open() {
        let mut status = BatteryStatus::new(BatteryMode::Charging);
        let mut probe = UnsupportedProbe;
        assert!(!should_pause(&mut status, &mut probe));
    }

    #[test]
    fn test_mode_serde_names() {
        let mode: BatteryMode = serde_yaml::from_str("charging").unwrap();
        assert_eq!(mode, BatteryMode::Charging);
        assert_eq!(serde_json::to_string(&BatteryMode::Full).unwrap(), "\"full\"");
        assert_eq!(BatteryMode::default(), BatteryMode::Ignored);
    }
}
