//! Time source for token issuance and verification.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Second resolution.
#[derive(Debug)]
pub struct ManualClock {
    seconds: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at the given unix timestamp.
    pub fn at(timestamp: i64) -> Self {
        Self {
            seconds: AtomicI64::new(timestamp),
        }
    }

    /// Create a clock frozen at the current wall time.
    pub fn starting_now() -> Self {
        Self::at(Utc::now().timestamp())
    }

    /// Move the clock forward by `seconds`.
    pub fn advance(&self, seconds: i64) {
        self.seconds.fetch_add(seconds, Ordering::SeqCst);
    }

    /// Jump to an absolute unix timestamp.
    pub fn set(&self, timestamp: i64) {
        self.seconds.store(timestamp, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let seconds = self.seconds.load(Ordering::SeqCst);
        DateTime::from_timestamp(seconds, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
