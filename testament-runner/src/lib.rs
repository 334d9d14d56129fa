// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for testament, an engine that plans, runs and reports on hierarchies of
//! tests.
//!
//! The basic flow of operations is:
//!
//! 1. Describe tests as [`Test`](test::Test) values: suites, plain functions and parameterized
//!    functions, with [traits](traits) such as tags, conditions and time limits.
//! 2. Build a [`Configuration`](config::Configuration), either in code or from a
//!    [`ConfigFile`](config::ConfigFile), choosing an event handler such as one of the
//!    [recorders](reporter).
//! 3. Create a [`Runner`](runner::Runner), which turns the tests into a [`Plan`](plan::Plan),
//!    and run it.
//!
//! Within a running test, the functions in this crate's root such as [`expect`] and
//! [`record_issue`] report problems against the test.

pub mod attachment;
pub mod config;
mod current;
pub mod errors;
pub mod graph;
mod helpers;
pub mod issue;
pub mod output;
pub mod plan;
pub mod reporter;
pub mod runner;
pub mod test;
pub mod test_filter;
pub mod time;
pub mod traits;
pub mod write_str;

pub use current::{
    Confirmation, IssueRecorder, attach, attach_file, confirmation, expect, expect_eq,
    record_comment, record_issue, with_known_issue,
};
pub use helpers::plural;
pub use testament_metadata::{SourceLocation, Tag, TestId};
