//! # Time Source and Sync Detection
//!
//! The clock never talks to a sync protocol directly. Instead it reads the local wall clock
//! and treats any year after the Unix epoch year as "has been synchronized at least once".
//!
//! ## Known Limitation
//! - ✅ A device whose RTC boots at exactly 1970 is reported unsynchronized
//! - ❌ A battery-backed RTC that retains a stale value from 1971 or later is reported
//!   synchronized before any real time signal arrives (false positive, not corrected here)

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, Utc};
use std::sync::{Mutex, PoisonError};

/// Year of the Unix epoch; an RTC that has never been set reads this year.
pub const EPOCH_YEAR: i32 = 1970;

/// 1970-01-01 00:00:00, what a never-set RTC reads.
pub fn unix_epoch() -> NaiveDateTime {
    DateTime::<Utc>::UNIX_EPOCH.naive_utc()
}

/// Wall-clock reading in local time.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The system clock in the local timezone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A settable clock for simulations and tests.
///
/// # Example
/// ```
/// use clock_face::sync::{is_synchronized, ManualClock, TimeSource};
///
/// let clock = ManualClock::unsynced();
/// assert!(!is_synchronized(&clock.now()));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// A clock sitting at the epoch, as an RTC reads before its first sync.
    pub fn unsynced() -> Self {
        Self::new(unix_epoch())
    }

    /// Convenience constructor; out-of-range fields fall back to the epoch.
    pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        let now = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, minute, second))
            .unwrap_or_else(unix_epoch);
        Self::new(now)
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Whether the clock has ever received a valid time signal.
///
/// Heuristic: synchronized iff the year is after [`EPOCH_YEAR`].
pub fn is_synchronized<D: Datelike>(now: &D) -> bool {
    now.year() > EPOCH_YEAR
}
