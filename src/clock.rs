//! Kernel clock-tick rate.
//!
//! Cumulative CPU counters are reported in clock ticks; the rate is queried
//! from the system once per process and cached.

use once_cell::sync::Lazy;
use tracing::warn;

/// Fallback when `sysconf` cannot report a rate.
pub const DEFAULT_TICKS_PER_SECOND: f64 = 100.0;

static TICKS_PER_SECOND: Lazy<f64> = Lazy::new(query_ticks_per_second);

/// Returns the number of clock ticks per wall-clock second.
pub fn ticks_per_second() -> f64 {
    *TICKS_PER_SECOND
}

fn query_ticks_per_second() -> f64 {
    // SAFETY: sysconf only reads a system constant and has no side effects.
    let hz = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if hz > 0 {
        hz as f64
    } else {
        warn!(
            "sysconf(_SC_CLK_TCK) returned {}, assuming {} ticks/s",
            hz, DEFAULT_TICKS_PER_SECOND
        );
        DEFAULT_TICKS_PER_SECOND
    }
}
