//! Wall-clock abstraction so services can be driven by deterministic time in tests.

use crate::domain::TimeMs;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the current time.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> TimeMs;
}

/// Reads the system clock through chrono.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimeMs {
        TimeMs::new(chrono::Utc::now().timestamp_millis())
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start: TimeMs) -> Self {
        Self {
            ms: AtomicI64::new(start.as_i64()),
        }
    }

    pub fn set(&self, t: TimeMs) {
        self.ms.store(t.as_i64(), Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> TimeMs {
        TimeMs::new(self.ms.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_moves_only_on_request() {
        let clock = ManualClock::new(TimeMs::new(1000));
        assert_eq!(clock.now(), TimeMs::new(1000));
        clock.advance(500);
        assert_eq!(clock.now(), TimeMs::new(1500));
        clock.set(TimeMs::new(10));
        assert_eq!(clock.now(), TimeMs::new(10));
    }

    #[test]
    fn test_system_clock_is_after_2020() {
        assert!(SystemClock.now() > TimeMs::new(1_577_836_800_000));
    }
}
