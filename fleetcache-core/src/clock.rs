//! Time source abstraction.
//!
//! Everything that stamps `now` (eviction markers, processed times, pass
//! start times) reads it through a [`Clock`] so tests can pin time.

use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::Timestamp;

pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Manually driven clock with millisecond resolution.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn at_millis(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    pub fn set(&self, time: Timestamp) {
        self.millis.store(time.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn set_millis(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let step = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(step, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let millis = self.millis.load(Ordering::SeqCst);
        DateTime::from_timestamp_millis(millis).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::at_millis(1_000);
        assert_eq!(clock.now().timestamp_millis(), 1_000);
        clock.advance(Duration::from_secs(2));
        assert_eq!(clock.now().timestamp_millis(), 3_000);
        clock.set_millis(42);
        assert_eq!(clock.now().timestamp_millis(), 42);
    }

    #[test]
    fn test_system_clock_is_recent() {
        let before = Utc::now();
        let now = SystemClock.now();
        assert!(now >= before);
    }
}
