//! Timestamps in unix seconds.
//!
//! Every record the plugin produces carries two clocks: `utc`, the plain unix
//! timestamp, and `local`, the same instant shifted by the machine's UTC
//! offset. The backend buckets activity by the user's local day using the
//! second value.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{Local, Offset};

/// A point in time expressed as UTC and local unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    /// Unix seconds.
    pub utc: i64,
    /// Unix seconds shifted by the local UTC offset.
    pub local: i64,
}

impl Timestamp {
    /// Builds a timestamp from UTC seconds and an offset in seconds.
    #[must_use]
    pub fn with_offset(utc: i64, offset_secs: i64) -> Self {
        Self {
            utc,
            local: utc + offset_secs,
        }
    }
}

/// Returns the current time.
#[must_use]
pub fn now() -> Timestamp {
    let now = Local::now();
    let offset = i64::from(now.offset().fix().local_minus_utc());
    Timestamp::with_offset(now.timestamp(), offset)
}

/// Local UTC offset in minutes, as reported in payloads.
#[must_use]
pub fn utc_offset_minutes() -> i64 {
    i64::from(Local::now().offset().fix().local_minus_utc()) / 60
}

/// Source of "now" for components that stamp start and end times.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        now()
    }
}

/// A clock that only moves when told to. Used by tests and replay tooling.
#[derive(Debug, Default)]
pub struct ManualClock {
    utc: AtomicI64,
}

impl ManualClock {
    #[must_use]
    pub fn new(utc: i64) -> Self {
        Self {
            utc: AtomicI64::new(utc),
        }
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: i64) {
        self.utc.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, utc: i64) {
        self.utc.store(utc, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::with_offset(self.utc.load(Ordering::SeqCst), 0)
    }
}
