// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use testament_metadata::TestamentExitCode;

/// Statistics about a finished run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// The number of plan steps that were part of the run.
    pub steps: usize,

    /// The number of iterations that ran.
    pub iterations: usize,

    /// The number of test functions that started, summed over all iterations.
    pub tests_started: usize,

    /// The number of tests and suites that were skipped, summed over all iterations.
    pub tests_skipped: usize,

    /// The number of suites that started, summed over all iterations.
    pub suites_started: usize,

    /// The number of issues recorded.
    pub issues: usize,

    /// The number of issues that caused a test to fail.
    pub failing_issues: usize,

    /// The number of known issues recorded.
    pub known_issues: usize,

    /// The number of tests and test cases that were cancelled.
    pub cancelled: usize,
}

impl RunStats {
    /// Returns true if any failing issue was recorded.
    pub fn has_failures(&self) -> bool {
        self.failing_issues > 0
    }

    /// Returns the exit code a process should exit with after this run.
    pub fn exit_code(&self) -> i32 {
        if self.steps == 0 {
            TestamentExitCode::NO_TESTS_RUN
        } else if self.has_failures() {
            TestamentExitCode::TEST_RUN_FAILED
        } else {
            TestamentExitCode::OK
        }
    }
}
