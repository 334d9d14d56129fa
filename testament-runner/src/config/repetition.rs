// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::Deserialize;
use std::num::NonZeroUsize;

/// When to continue repeating a test run.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Continuation {
    /// Repeat until the maximum iteration count is reached.
    #[default]
    Always,

    /// Stop after the first iteration that records a failing issue.
    UntilIssueRecorded,

    /// Stop after the first iteration that records no failing issue.
    WhileIssueRecorded,
}

impl Continuation {
    /// Returns true if another iteration should run, given whether the iteration that just
    /// finished recorded a failing issue.
    pub fn should_continue(self, issue_recorded: bool) -> bool {
        match self {
            Continuation::Always => true,
            Continuation::UntilIssueRecorded => !issue_recorded,
            Continuation::WhileIssueRecorded => issue_recorded,
        }
    }
}

/// How many times to run the plan, and when to stop early.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepetitionPolicy {
    /// The maximum number of iterations.
    pub maximum_iteration_count: NonZeroUsize,

    /// When to stop before reaching the maximum.
    pub continuation: Continuation,
}

impl RepetitionPolicy {
    /// Runs the plan exactly once.
    pub const ONCE: Self = Self {
        maximum_iteration_count: NonZeroUsize::MIN,
        continuation: Continuation::Always,
    };

    /// Runs the plan up to `maximum_iteration_count` times.
    pub fn repeating(continuation: Continuation, maximum_iteration_count: NonZeroUsize) -> Self {
        Self {
            maximum_iteration_count,
            continuation,
        }
    }
}

impl Default for RepetitionPolicy {
    fn default() -> Self {
        Self::ONCE
    }
}
