//! Time source used for timestamps and rotation decisions

use chrono::{DateTime, Duration, Local};
use parking_lot::Mutex;

/// Source of the current wall-clock time
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Local>;
}

/// The real system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to
///
/// Useful for driving period rotation deterministically.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jump to a specific time
    pub fn set(&self, time: DateTime<Local>) {
        *self.now.lock() = time;
    }

    /// Move forward by `by`
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock()
    }
}
