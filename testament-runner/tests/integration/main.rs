// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for testament-runner.
//!
//! Tests are organized by area: running the fixture catalog, filtering, ordering and event
//! pairing, repetition, and the output of each recorder.

mod basic;
mod filter;
mod fixtures;
mod junit;
mod ordering;
mod recorders;
mod repetition;
