//! CPU usage estimation from cumulative clock-tick counters.
//!
//! Usage is derived from the delta between two samples of the same process.
//! Baselines are keyed by pid but carry the process start time, so a reused
//! pid never inherits the counters of the process that held it before.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use std::time::Instant;

/// Cumulative CPU ticks of one process at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuSample {
    pub ticks: u64,
    pub at: Instant,
}

/// Fraction of one core consumed between `prev` and `now`, in [0, 1].
///
/// Returns 0 when there is no usable baseline: time did not advance, or the
/// tick counter went backwards.
pub fn estimate_usage(prev: CpuSample, now: CpuSample, ticks_per_second: f64) -> f64 {
    let elapsed = match now.at.checked_duration_since(prev.at) {
        Some(d) if !d.is_zero() => d.as_secs_f64(),
        _ => return 0.0,
    };
    if now.ticks < prev.ticks || ticks_per_second <= 0.0 {
        return 0.0;
    }

    let cpu_seconds = (now.ticks - prev.ticks) as f64 / ticks_per_second;
    (cpu_seconds / elapsed).clamp(0.0, 1.0)
}

/// Cache entry for delta-based CPU calculation
#[derive(Debug, Clone, Copy)]
struct CpuEntry {
    start_time: u64,
    sample: CpuSample,
}

/// Last observed sample per process, used as the baseline for the next one.
#[derive(Debug, Default)]
pub struct CpuHistory {
    entries: HashMap<u32, CpuEntry>,
}

impl CpuHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `sample` for (`pid`, `start_time`) and returns the usage since
    /// the previous sample of the same process, or 0 on first observation.
    pub fn observe(
        &mut self,
        pid: u32,
        start_time: u64,
        sample: CpuSample,
        ticks_per_second: f64,
    ) -> f64 {
        let usage = match self.entries.get(&pid) {
            Some(prev) if prev.start_time == start_time => {
                estimate_usage(prev.sample, sample, ticks_per_second)
            }
            _ => 0.0,
        };

        self.entries.insert(pid, CpuEntry { start_time, sample });
        usage
    }

    /// Drops baselines for processes not in `seen`.
    pub fn retain(&mut self, seen: &HashSet<u32>) {
        self.entries.retain(|pid, _| seen.contains(pid));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const HZ: f64 = 100.0;

    fn sample(ticks: u64, at: Instant) -> CpuSample {
        CpuSample { ticks, at }
    }

    #[test]
    fn test_half_core_usage() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(2);
        // 100 ticks at 100 Hz over 2 s
        let usage = estimate_usage(sample(500, t0), sample(600, t1), HZ);
        assert!((usage - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_usage_stays_within_unit_interval() {
        let t0 = Instant::now();
        for (delta_ticks, millis) in [(0u64, 1u64), (1, 1), (10, 100), (1000, 10), (7, 3000)] {
            let t1 = t0 + Duration::from_millis(millis);
            let usage = estimate_usage(sample(42, t0), sample(42 + delta_ticks, t1), HZ);
            assert!(
                (0.0..=1.0).contains(&usage),
                "usage {} out of range for {} ticks in {} ms",
                usage,
                delta_ticks,
                millis
            );
        }
    }

    #[test]
    fn test_rounding_overshoot_is_clamped() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(90);
        // 10 ticks = 100 ms of CPU reported within 90 ms of wall time
        let usage = estimate_usage(sample(0, t0), sample(10, t1), HZ);
        assert_eq!(usage, 1.0);
    }

    #[test]
    fn test_no_elapsed_time_yields_zero() {
        let t0 = Instant::now();
        assert_eq!(estimate_usage(sample(0, t0), sample(50, t0), HZ), 0.0);

        let earlier = t0 + Duration::from_secs(1);
        assert_eq!(estimate_usage(sample(0, earlier), sample(50, t0), HZ), 0.0);
    }

    #[test]
    fn test_decreasing_counter_yields_zero() {
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_secs(1);
        assert_eq!(estimate_usage(sample(200, t0), sample(10, t1), HZ), 0.0);
    }

    #[test]
    fn test_history_first_observation_is_zero() {
        let mut history = CpuHistory::new();
        let usage = history.observe(10, 5000, sample(300, Instant::now()), HZ);
        assert_eq!(usage, 0.0);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_history_uses_baseline_for_same_process() {
        let mut history = CpuHistory::new();
        let t0 = Instant::now();
        history.observe(10, 5000, sample(300, t0), HZ);
        let usage = history.observe(10, 5000, sample(325, t0 + Duration::from_secs(1)), HZ);
        assert!((usage - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_history_resets_on_pid_reuse() {
        let mut history = CpuHistory::new();
        let t0 = Instant::now();
        history.observe(10, 5000, sample(10, t0), HZ);

        // Same pid, different start time: unrelated process with a larger counter
        let usage = history.observe(10, 9000, sample(90, t0 + Duration::from_secs(1)), HZ);
        assert_eq!(usage, 0.0);

        // The new process becomes the baseline
        let usage = history.observe(10, 9000, sample(140, t0 + Duration::from_secs(2)), HZ);
        assert!((usage - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_history_retain_prunes_unseen() {
        let mut history = CpuHistory::new();
        let t0 = Instant::now();
        history.observe(1, 1, sample(0, t0), HZ);
        history.observe(2, 1, sample(0, t0), HZ);

        let seen: HashSet<u32> = [2].into_iter().collect();
        history.retain(&seen);
        assert_eq!(history.len(), 1);

        let usage = history.observe(1, 1, sample(50, t0 + Duration::from_secs(1)), HZ);
        assert_eq!(usage, 0.0);
    }
}
