// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Time source for the alert pipeline

use std::time::Instant;
use chrono::{DateTime, Local};

/// Monotonic time for the latch and cooldown, wall time for records
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn wall(&self) -> DateTime<Local>;
}

/// The real clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[cfg(test)]
pub(crate) use manual::ManualClock;

#[cfg(test)]
mod manual {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Clock that only moves when told to
    pub struct ManualClock {
        start: Instant,
        wall_start: DateTime<Local>,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                start: Instant::now(),
                wall_start: Local::now(),
                offset: Mutex::new(Duration::ZERO),
            }
        }

        /// Jump to `secs` after the clock's creation
        pub fn set(&self, secs: f64) {
            *self.offset.lock() = Duration::from_secs_f64(secs);
        }

        pub fn advance(&self, by: Duration) {
            *self.offset.lock() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.start + *self.offset.lock()
        }

        fn wall(&self) -> DateTime<Local> {
            let offset = *self.offset.lock();
            self.wall_start + chrono::Duration::milliseconds(offset.as_millis() as i64)
        }
    }
}
