// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for a test run.
//!
//! A [`Configuration`] is constructed once per run and shared by reference with everything that
//! executes as part of the run. Several runners with different configurations can be active in
//! the same process at once.
//!
//! Configurations are usually built in code, but can also be loaded from a TOML file through
//! [`ConfigFile`]. Values are validated eagerly when the file is loaded, so that mistakes such as
//! invalid filter patterns are reported before any test runs.

mod file;
mod imp;
mod repetition;
mod time_limits;

pub use file::*;
pub use imp::*;
pub use repetition::*;
pub use time_limits::*;
