// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for testament runs.
///
/// A run's exit status is driven solely by whether a failing issue (an issue
/// that is not known and has error severity) was recorded anywhere during the
/// run. Reporter formatting choices never influence it.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum TestamentExitCode {}

impl TestamentExitCode {
    /// No failing issues were recorded.
    pub const OK: i32 = 0;

    /// No tests were selected to run, but no other errors occurred.
    pub const NO_TESTS_RUN: i32 = 4;

    /// One or more failing issues were recorded.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// The test filter or configuration was invalid.
    pub const SETUP_ERROR: i32 = 96;

    /// Writing reporter output produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
