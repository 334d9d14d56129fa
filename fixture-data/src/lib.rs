// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixture data shared by testament's integration tests.

pub mod models;
