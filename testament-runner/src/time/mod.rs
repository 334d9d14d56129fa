// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time tracking for test runs.

mod instant;

pub use instant::*;
