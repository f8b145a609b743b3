use chrono::{DateTime, Utc};
use std::sync::RwLock;

/// # Summary
/// Source of wall-clock time, hijackable for deterministic tests.
///
/// # Invariants
/// - Every wall-clock read in the ingest path goes through this trait; nothing
///   calls `Utc::now()` directly outside of a `TimeProvider` implementation.
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Real wall clock, used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealTimeProvider;

impl TimeProvider for RealTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fake clock for tests: callers advance it explicitly instead of sleeping.
pub struct FakeClockProvider {
    current: RwLock<DateTime<Utc>>,
}

impl FakeClockProvider {
    pub fn new(initial: DateTime<Utc>) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    pub fn set(&self, new_time: DateTime<Utc>) {
        if let Ok(mut guard) = self.current.write() {
            *guard = new_time;
        }
    }

    pub fn advance_millis(&self, millis: i64) {
        if let Ok(mut guard) = self.current.write() {
            *guard += chrono::Duration::milliseconds(millis);
        }
    }
}

impl TimeProvider for FakeClockProvider {
    fn now(&self) -> DateTime<Utc> {
        self.current.read().map(|g| *g).unwrap_or_else(|_| Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances() {
        let clock = FakeClockProvider::new(DateTime::from_timestamp(0, 0).unwrap_or_default());
        let t0 = clock.now_millis();
        clock.advance_millis(1500);
        assert_eq!(clock.now_millis(), t0 + 1500);
    }
}
