// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Identity types shared across testament crates.
//!
//! These types are deliberately lightweight: they carry no test bodies or
//! traits, only the information needed to name a test, locate it in source and
//! order it. They are serializable so that machine-readable consumers can refer
//! to tests by the same identifiers the runner uses.

mod errors;
mod exit_codes;
#[cfg(feature = "proptest1")]
mod proptest_helpers;
mod test_id;

pub use errors::*;
pub use exit_codes::*;
pub use test_id::*;
