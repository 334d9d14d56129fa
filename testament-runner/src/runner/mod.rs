// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test runner.
//!
//! The main structure in this module is [`Runner`].

mod context;
mod imp;
mod serializer;
mod stats;

pub(crate) use context::{EventPoster, RunContext, RunObserver};
pub use imp::*;
pub(crate) use serializer::Serializer;
pub use stats::RunStats;
