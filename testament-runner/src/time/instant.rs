// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Points in time at which events occur.
//!
//! Events need both a wall-clock time (for reports such as JUnit timestamps) and a monotonic time
//! (for measuring durations). For that we use a combination of a `DateTime<Local>` (realtime clock)
//! and an `Instant` (monotonic clock), captured together.

use chrono::{DateTime, Local};
use std::{
    fmt,
    time::{Duration, Instant},
};

/// A point in time, captured on both the monotonic and the wall clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventInstant {
    monotonic: Instant,
    wall: DateTime<Local>,
}

impl EventInstant {
    /// Captures the current instant.
    pub fn now() -> Self {
        Self {
            // These two syscalls will happen imperceptibly close to each other, which is good
            // enough for our purposes.
            monotonic: Instant::now(),
            wall: Local::now(),
        }
    }

    /// Returns the monotonic clock reading of this instant.
    pub fn monotonic(&self) -> Instant {
        self.monotonic
    }

    /// Returns the wall clock reading of this instant.
    pub fn wall(&self) -> DateTime<Local> {
        self.wall
    }

    /// Returns the time elapsed from `earlier` to `self` on the monotonic clock.
    ///
    /// Returns zero if `earlier` is actually later than `self`.
    pub fn duration_since(&self, earlier: EventInstant) -> Duration {
        self.monotonic.saturating_duration_since(earlier.monotonic)
    }

    /// Returns the time elapsed since this instant.
    pub fn elapsed(&self) -> Duration {
        self.monotonic.elapsed()
    }
}

/// Displays a duration as seconds with three decimal places, for example `1.250`.
///
/// Human-readable and JUnit output both use this format.
#[derive(Clone, Copy, Debug)]
pub struct DisplaySeconds(pub Duration);

impl fmt::Display for DisplaySeconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0.as_secs_f64())
    }
}
