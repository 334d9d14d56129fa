// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use owo_colors::{Style, style};

/// A symbol prefixing a line of human-readable output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// A neutral message, such as a test starting.
    Default,

    /// A test was skipped or cancelled.
    Skip,

    /// A test passed, possibly with known issues.
    Pass {
        /// The number of known issues recorded.
        known_issue_count: usize,
    },

    /// A test passed, but recorded warnings.
    PassWithWarnings,

    /// A test failed.
    Fail,

    /// A difference between two values.
    Difference,

    /// A warning.
    Warning,

    /// Additional details about the previous message.
    Details,

    /// A value was attached to a test.
    Attachment,
}

impl Symbol {
    /// Returns the Unicode glyph for this symbol.
    pub fn unicode(self) -> &'static str {
        match self {
            Symbol::Default => "\u{25c7}",
            Symbol::Skip => "\u{21b7}",
            Symbol::Pass {
                known_issue_count: 0,
            }
            | Symbol::PassWithWarnings => "\u{2714}",
            Symbol::Pass { .. } | Symbol::Fail => "\u{2718}",
            Symbol::Difference => "\u{00b1}",
            Symbol::Warning => "\u{26a0}\u{fe0e}",
            Symbol::Details => "\u{21b3}",
            Symbol::Attachment => "\u{2399}",
        }
    }

    /// Returns the ASCII glyph for this symbol.
    pub fn ascii(self) -> &'static str {
        match self {
            Symbol::Default => "-",
            Symbol::Skip => ">",
            Symbol::Pass {
                known_issue_count: 0,
            }
            | Symbol::PassWithWarnings => "+",
            Symbol::Pass { .. } => "x",
            Symbol::Fail => "X",
            Symbol::Difference => "~",
            Symbol::Warning => "!",
            Symbol::Details => "|",
            Symbol::Attachment => "@",
        }
    }

    /// Returns the glyph for this symbol in the given glyph set.
    pub fn glyph(self, use_unicode: bool) -> &'static str {
        if use_unicode {
            self.unicode()
        } else {
            self.ascii()
        }
    }

    /// Returns the style to render this symbol with when colorizing.
    pub fn style(self) -> Style {
        match self {
            Symbol::Default | Symbol::Details | Symbol::Difference | Symbol::Attachment => {
                style().dimmed()
            }
            Symbol::Skip => style().purple(),
            Symbol::Pass {
                known_issue_count: 0,
            } => style().green(),
            Symbol::Pass { .. } => style().bright_black(),
            Symbol::PassWithWarnings | Symbol::Warning => style().yellow(),
            Symbol::Fail => style().red().bold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_issues_change_the_glyph() {
        let pass = Symbol::Pass {
            known_issue_count: 0,
        };
        let known = Symbol::Pass {
            known_issue_count: 2,
        };
        assert_ne!(pass.unicode(), known.unicode());
        assert_ne!(pass.ascii(), known.ascii());
        assert_eq!(Symbol::Fail.glyph(false), "X");
        assert_eq!(Symbol::Skip.glyph(true), "\u{21b7}");
    }
}
