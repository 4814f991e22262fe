//! Utility modules for the Music Time plugin.
//!
//! # Modules
//!
//! - [`time`]: Wall-clock and timezone-normalized timestamps, plus the
//!   [`Clock`] seam used by the aggregator and the track tracker

pub mod time;

pub use time::{Clock, ManualClock, SystemClock, Timestamp};
