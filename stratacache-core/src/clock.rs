//! # Clock Module
//!
//! Wall-clock abstraction for expiry computations. All expiries in the
//! cache are tracked at whole-second resolution, so every clock reading is
//! floored to the second before use.
//!
//! Layers accept an injected [`Clock`] (defaulting to [`SystemClock`]) so
//! expiry math can be driven deterministically in tests via
//! [`ManualClock`].

use chrono::{DateTime, SubsecRound, Utc};
use std::fmt::Debug;
use std::sync::Mutex;

/// Source of the current wall-clock time, floored to the second.
pub trait Clock: Send + Sync + Debug {
    /// Current UTC time with sub-second precision dropped.
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(0)
    }
}

/// Manually driven clock for deterministic expiry tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start.trunc_subsecs(0)),
        }
    }

    /// Move the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap() = instant.trunc_subsecs(0);
    }

    /// Advance the clock by a relative amount.
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now = (*now + by).trunc_subsecs(0);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_floors_to_second() {
        let now = SystemClock.now();
        assert_eq!(now.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(Utc::now());
        let start = clock.now();

        clock.advance(chrono::Duration::seconds(90));
        assert_eq!(clock.now() - start, chrono::Duration::seconds(90));
    }
}
