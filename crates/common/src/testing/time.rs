//! Manually advanced clock for deterministic expiry tests

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::time::Clock;

/// Mock clock for deterministic testing
///
/// Starts at a whole-second instant and only moves when advanced. Clones
/// share the same time.
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a clock starting at the current real time, truncated to seconds
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self::at(DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now))
    }

    /// Create a clock starting at `start`
    #[must_use]
    pub fn at(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    /// Advance the clock without real time passing
    pub fn advance(&self, duration: Duration) {
        let step = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
        let mut now = self.now.lock();
        *now += step;
    }

    /// Jump to an absolute time
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock_advance_shared_across_clones() {
        let clock = MockClock::at(DateTime::from_timestamp(1_700_000_000, 0).unwrap());
        let observer = clock.clone();

        clock.advance(Duration::from_secs(300));
        assert_eq!(observer.now().timestamp(), 1_700_000_300);
    }

    #[test]
    fn test_mock_clock_starts_on_whole_second() {
        let clock = MockClock::new();
        assert_eq!(clock.now().timestamp_subsec_nanos(), 0);
    }
}
