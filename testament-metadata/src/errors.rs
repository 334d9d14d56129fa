// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{error, fmt};

/// An error that occurs while parsing a [`SourceLocation`](crate::SourceLocation) from a string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLocationParseError {
    input: String,
    reason: &'static str,
}

impl SourceLocationParseError {
    pub(crate) fn new(input: impl Into<String>, reason: &'static str) -> Self {
        Self {
            input: input.into(),
            reason,
        }
    }

    /// Returns the input that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl fmt::Display for SourceLocationParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "invalid source location `{}` (expected `file:line:column`): {}",
            self.input, self.reason
        )
    }
}

impl error::Error for SourceLocationParseError {}
