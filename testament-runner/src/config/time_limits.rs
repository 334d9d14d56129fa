// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::test::Test;
use std::time::Duration;

/// Time limit settings for a run.
///
/// The effective time limit of a test is the shortest limit among its traits, or the default if
/// no trait sets one. It is rounded up to a multiple of the granularity and then capped at the
/// maximum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeLimits {
    /// The limit applied to tests without a time limit trait.
    pub default: Option<Duration>,

    /// The longest limit any test may have.
    pub maximum: Option<Duration>,

    /// Limits are rounded up to a multiple of this duration. Zero disables rounding.
    pub granularity: Duration,
}

impl TimeLimits {
    /// The default granularity: one minute.
    pub const DEFAULT_GRANULARITY: Duration = Duration::from_secs(60);

    /// Returns the time limit to enforce for each test case of `test`, if any.
    pub fn effective_limit(&self, test: &Test) -> Option<Duration> {
        let from_traits = test.traits.iter().filter_map(|t| t.time_limit()).min();
        let limit = from_traits.or(self.default).map(|limit| self.round_up(limit));
        match (limit, self.maximum) {
            (Some(limit), Some(maximum)) => Some(limit.min(maximum)),
            (limit, maximum) => limit.or(maximum),
        }
    }

    fn round_up(&self, limit: Duration) -> Duration {
        let granularity = self.granularity.as_nanos();
        if granularity == 0 {
            return limit;
        }
        let steps = limit.as_nanos().div_ceil(granularity);
        let nanos = steps.saturating_mul(granularity);
        match u64::try_from(nanos) {
            Ok(nanos) => Duration::from_nanos(nanos),
            Err(_) => Duration::MAX,
        }
    }
}

impl Default for TimeLimits {
    fn default() -> Self {
        Self {
            default: None,
            maximum: None,
            granularity: Self::DEFAULT_GRANULARITY,
        }
    }
}
