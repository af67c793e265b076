//! Timestamp sources for job events.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Source of event timestamps in milliseconds since the epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock that never repeats or goes backwards within a process.
///
/// Two events written in the same millisecond get consecutive values, so
/// the timestamp stays usable as a version marker.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> i64 {
        let wall = Utc::now().timestamp_millis();
        let mut previous = self.last.load(Ordering::SeqCst);
        loop {
            let next = wall.max(previous + 1);
            match self
                .last
                .compare_exchange(previous, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(current) => previous = current,
            }
        }
    }
}

/// Deterministic clock for tests: starts at a value and steps by one.
#[derive(Debug)]
pub struct StepClock {
    next: AtomicI64,
}

impl StepClock {
    pub fn starting_at(start: i64) -> Self {
        Self {
            next: AtomicI64::new(start),
        }
    }
}

impl Clock for StepClock {
    fn now_millis(&self) -> i64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}
