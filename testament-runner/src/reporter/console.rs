// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line-oriented console output.

use super::{
    HumanReadableRecorder, Message, Symbol,
    events::{Event, EventContext, EventHandler, EventKind},
};
use crate::{output::Color, test::Test, write_str::WriteStr};
use owo_colors::{AnsiColors, OwoColorize, Rgb, Style};
use std::{
    collections::BTreeMap,
    fmt,
    sync::{Mutex, PoisonError},
};
use testament_metadata::Tag;
use tracing::warn;

/// A color used to mark tests carrying a tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TagColor {
    /// The color used on terminals supporting 256 colors or more.
    pub rich: Rgb,

    /// The color used on terminals supporting only the basic ANSI palette.
    pub basic: AnsiColors,
}

impl TagColor {
    /// Creates a new tag color.
    pub const fn new(rich: Rgb, basic: AnsiColors) -> Self {
        Self { rich, basic }
    }

    fn style(self, use_256_colors: bool) -> Style {
        if use_256_colors {
            Style::new().color(self.rich)
        } else {
            Style::new().color(self.basic)
        }
    }
}

/// The tags every console recorder colors, and their colors.
///
/// These cannot be overridden.
pub const BASE_TAG_COLORS: [(&str, TagColor); 6] = [
    ("red", TagColor::new(Rgb(255, 59, 48), AnsiColors::Red)),
    ("orange", TagColor::new(Rgb(255, 149, 0), AnsiColors::BrightRed)),
    ("yellow", TagColor::new(Rgb(255, 204, 0), AnsiColors::Yellow)),
    ("green", TagColor::new(Rgb(52, 199, 89), AnsiColors::Green)),
    ("blue", TagColor::new(Rgb(0, 122, 255), AnsiColors::Blue)),
    ("purple", TagColor::new(Rgb(175, 82, 222), AnsiColors::Magenta)),
];

/// Options controlling how a [`ConsoleRecorder`] renders output.
#[derive(Clone, Debug, Default)]
pub struct ConsoleRecorderOptions {
    /// Whether to use ANSI escape sequences for color and emphasis.
    pub use_ansi: bool,

    /// Whether the terminal supports 256 colors or more.
    pub use_256_colors: bool,

    /// Whether to use Unicode glyphs rather than ASCII.
    pub use_unicode: bool,

    /// Additional tag colors. Entries for the base tags are ignored.
    pub tag_colors: BTreeMap<Tag, TagColor>,
}

impl ConsoleRecorderOptions {
    /// Detects the options supported by standard error, honoring the given color setting.
    pub fn for_stderr(color: Color) -> Self {
        let stream = supports_color::Stream::Stderr;
        Self {
            use_ansi: color.should_colorize(stream),
            use_256_colors: color.supports_256_colors(stream),
            use_unicode: supports_unicode::on(supports_unicode::Stream::Stderr),
            tag_colors: BTreeMap::new(),
        }
    }

    /// Adds a color for a tag.
    pub fn with_tag_color(mut self, tag: Tag, color: TagColor) -> Self {
        self.tag_colors.insert(tag, color);
        self
    }

    /// Returns the effective tag colors: the user's, with the base palette taking precedence.
    pub fn effective_tag_colors(&self) -> BTreeMap<Tag, TagColor> {
        let mut colors = self.tag_colors.clone();
        colors.extend(
            BASE_TAG_COLORS
                .iter()
                .map(|(name, color)| (Tag::new(*name), *color)),
        );
        colors
    }
}

/// Renders events as lines of text, one message per line.
pub struct ConsoleRecorder<W> {
    options: ConsoleRecorderOptions,
    tag_colors: BTreeMap<Tag, TagColor>,
    human: HumanReadableRecorder,
    writer: Mutex<W>,
}

impl<W: WriteStr> ConsoleRecorder<W> {
    /// Creates a new recorder writing to `writer`.
    pub fn new(options: ConsoleRecorderOptions, writer: W) -> Self {
        Self {
            tag_colors: options.effective_tag_colors(),
            options,
            human: HumanReadableRecorder::new(),
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the recorder, returning its writer.
    pub fn into_writer(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Renders a single message as a line, without a trailing newline.
    pub fn render_message(&self, message: &Message, test: Option<&Test>) -> String {
        let mut line = " ".repeat(message.indentation * 2);
        let glyph = message.symbol.glyph(self.options.use_unicode);
        if self.options.use_ansi {
            line.push_str(&glyph.style(message.symbol.style()).to_string());
        } else {
            line.push_str(glyph);
        }
        line.push(' ');

        if let Some(test) = test {
            line.push_str(&self.tag_bullets(test));
        }

        if self.options.use_ansi && message.symbol == Symbol::Fail {
            line.push_str(&message.text.style(Style::new().bold()).to_string());
        } else {
            line.push_str(&message.text);
        }
        line
    }

    fn tag_bullets(&self, test: &Test) -> String {
        if !self.options.use_ansi {
            return String::new();
        }
        let bullet = if self.options.use_unicode {
            "\u{25cf}"
        } else {
            "*"
        };
        let mut bullets = String::new();
        for tag in test.tags() {
            if let Some(color) = self.tag_colors.get(&tag) {
                let style = TagColor::style(*color, self.options.use_256_colors);
                bullets.push_str(&bullet.style(style).to_string());
            }
        }
        if !bullets.is_empty() {
            bullets.push(' ');
        }
        bullets
    }

    fn write_messages(&self, messages: &[Message], test: Option<&Test>) -> std::io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        for message in messages {
            // Only the headline of a test's lifecycle message carries its tags.
            let test = test.filter(|_| message.indentation == 0);
            writeln!(writer, "{}", self.render_message(message, test))?;
        }
        writer.write_str_flush()
    }
}

impl<W: WriteStr + Send> EventHandler for ConsoleRecorder<W> {
    fn handle_event(&self, event: &Event, context: &EventContext<'_>) {
        let messages = self.human.record(event, context);
        if messages.is_empty() {
            return;
        }
        let tagged_test = match event.kind {
            EventKind::TestStarted | EventKind::TestEnded | EventKind::TestSkipped(_) => {
                context.test
            }
            _ => None,
        };
        if let Err(error) = self.write_messages(&messages, tagged_test) {
            warn!(
                event = event.kind.name(),
                error = &error as &dyn std::error::Error,
                "failed to write console output"
            );
        }
    }
}

impl<W> fmt::Debug for ConsoleRecorder<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleRecorder")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
