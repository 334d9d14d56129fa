// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for testament-runner.

use unicode_width::UnicodeWidthChar;

/// Utilities for pluralizing various words based on count or plurality.
pub mod plural {
    /// Returns "test" if `count` is 1, otherwise "tests".
    pub fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }

    /// Returns "suite" if `count` is 1, otherwise "suites".
    pub fn suites_str(count: usize) -> &'static str {
        if count == 1 { "suite" } else { "suites" }
    }

    /// Returns "issue" if `count` is 1, otherwise "issues".
    pub fn issues_str(count: usize) -> &'static str {
        if count == 1 { "issue" } else { "issues" }
    }

    /// Returns "known issue" if `count` is 1, otherwise "known issues".
    pub fn known_issues_str(count: usize) -> &'static str {
        if count == 1 {
            "known issue"
        } else {
            "known issues"
        }
    }

    /// Returns "warning" if `count` is 1, otherwise "warnings".
    pub fn warnings_str(count: usize) -> &'static str {
        if count == 1 { "warning" } else { "warnings" }
    }

    /// Returns "argument" if `count` is 1, otherwise "arguments".
    pub fn arguments_str(count: usize) -> &'static str {
        if count == 1 { "argument" } else { "arguments" }
    }

    /// Returns "iteration" if `count` is 1, otherwise "iterations".
    pub fn iterations_str(count: usize) -> &'static str {
        if count == 1 { "iteration" } else { "iterations" }
    }

    /// Returns "test case" if `count` is 1, otherwise "test cases".
    pub fn test_cases_str(count: usize) -> &'static str {
        if count == 1 { "test case" } else { "test cases" }
    }
}

/// Returns the number of terminal columns `text` occupies, ignoring ANSI escape sequences.
pub(crate) fn text_width(text: &str) -> usize {
    // The width of a string may differ from the sum of the widths of its characters, but summing
    // is what truncation below can handle consistently.
    strip_ansi_escapes::strip_str(text)
        .chars()
        .map(|c| c.width().unwrap_or(0))
        .sum()
}

/// Truncates `text` to at most `max_width` columns, ending it with an ellipsis if anything was
/// cut off.
///
/// ANSI escape sequences are stripped from truncated text.
pub(crate) fn truncate_with_ellipsis(text: &str, max_width: usize, ellipsis: &str) -> String {
    if text_width(text) <= max_width {
        return text.to_owned();
    }

    let budget = max_width.saturating_sub(text_width(ellipsis));
    let mut width = 0;
    let mut res = String::new();
    for c in strip_ansi_escapes::strip_str(text).chars() {
        let c_width = c.width().unwrap_or(0);
        if width + c_width > budget {
            break;
        }
        res.push(c);
        width += c_width;
    }
    res.push_str(ellipsis);
    res
}
