//! Time source for bucket refills.
//!
//! Buckets are refilled from wall-clock time in fractional seconds so the
//! same timestamps can be shared with a remote store across processes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current time as fractional Unix seconds.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch, sub-second resolution.
    fn now_secs(&self) -> f64;
}

/// Real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Manually driven clock for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at `start_secs`.
    pub fn new(start_secs: f64) -> Self {
        Self {
            micros: AtomicU64::new((start_secs * 1_000_000.0) as u64),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        self.micros
            .fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> f64 {
        self.micros.load(Ordering::SeqCst) as f64 / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(100.0);
        assert_eq!(clock.now_secs(), 100.0);

        clock.advance(Duration::from_millis(250));
        assert!((clock.now_secs() - 100.25).abs() < 1e-9);
    }

    #[test]
    fn test_system_clock_has_subsecond_resolution() {
        let now = SystemClock.now_secs();
        assert!(now > 1_600_000_000.0);
        assert!(now.fract() >= 0.0);
    }
}
