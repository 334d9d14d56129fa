// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tree-shaped console output.
//!
//! [`HierarchyRecorder`] mirrors the nesting of suites and tests. While the run is in progress it
//! only drives a spinner; the tree is rendered and written in one go once the run ends, so that
//! the spinner never interleaves with it.

use super::{
    Symbol,
    events::{Event, EventContext, EventHandler, EventKind},
    human::label,
};
use crate::{
    graph::{Graph, NodeRef},
    helpers::{plural, text_width, truncate_with_ellipsis},
    issue::{Severity, SkipInfo},
    time::{DisplaySeconds, EventInstant},
    write_str::WriteStr,
};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use owo_colors::{OwoColorize, Style};
use smol_str::SmolStr;
use std::{
    fmt,
    sync::{Mutex, PoisonError},
    time::Duration,
};
use swrite::{SWrite, swrite};
use tracing::warn;

/// The column durations are right-aligned to.
pub const DEFAULT_DURATION_COLUMN: usize = 80;

/// The maximum width of a failure detail line, excluding its tree prefix.
pub const FAILURE_DETAIL_WIDTH: usize = 96;

/// The characters used to draw the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoxChars {
    /// Unicode box-drawing characters with rounded corners.
    Unicode,

    /// Box-drawing characters available in code page 437, for legacy Windows consoles.
    Cp437,

    /// Plain ASCII.
    Ascii,
}

impl BoxChars {
    /// Picks the richest character set the output is likely to support.
    pub fn detect(use_ansi: bool, use_unicode: bool) -> Self {
        if use_unicode && use_ansi && !cfg!(windows) {
            BoxChars::Unicode
        } else if use_ansi && cfg!(windows) {
            BoxChars::Cp437
        } else {
            BoxChars::Ascii
        }
    }

    fn branch(self) -> &'static str {
        match self {
            BoxChars::Unicode | BoxChars::Cp437 => "\u{251c}\u{2500} ",
            BoxChars::Ascii => "|-- ",
        }
    }

    fn last_branch(self) -> &'static str {
        match self {
            BoxChars::Unicode => "\u{2570}\u{2500} ",
            BoxChars::Cp437 => "\u{2514}\u{2500} ",
            BoxChars::Ascii => "`-- ",
        }
    }

    fn continuation(self) -> &'static str {
        match self {
            BoxChars::Unicode | BoxChars::Cp437 => "\u{2502}  ",
            BoxChars::Ascii => "|   ",
        }
    }

    fn blank(self) -> &'static str {
        match self {
            BoxChars::Unicode | BoxChars::Cp437 => "   ",
            BoxChars::Ascii => "    ",
        }
    }

    fn uses_unicode_symbols(self) -> bool {
        !matches!(self, BoxChars::Ascii)
    }
}

/// Options controlling how a [`HierarchyRecorder`] renders output.
#[derive(Clone, Debug)]
pub struct HierarchyRecorderOptions {
    /// Whether to use ANSI escape sequences for color.
    pub use_ansi: bool,

    /// The characters used to draw the tree.
    pub box_chars: BoxChars,

    /// Whether to draw a spinner on standard error while the run is in progress.
    pub show_spinner: bool,

    /// The column durations are right-aligned to.
    pub duration_column: usize,
}

impl Default for HierarchyRecorderOptions {
    fn default() -> Self {
        Self {
            use_ansi: false,
            box_chars: BoxChars::Ascii,
            show_spinner: false,
            duration_column: DEFAULT_DURATION_COLUMN,
        }
    }
}

#[derive(Clone, Debug, Default)]
struct NodeData {
    label: String,
    is_suite: bool,
    started: Option<EventInstant>,
    ended: Option<EventInstant>,
    skip: Option<SkipInfo>,
    cancellation: Option<SkipInfo>,
    failures: Vec<String>,
    known_issues: usize,
    warnings: usize,
}

impl NodeData {
    fn duration(&self) -> Option<Duration> {
        Some(self.ended?.duration_since(self.started?))
    }
}

#[derive(Debug, Default)]
struct Tree {
    run_started: Option<EventInstant>,
    run_ended: Option<EventInstant>,
    nodes: Graph<SmolStr, NodeData>,
}

/// Renders the run as a tree of suites and tests once it ends.
pub struct HierarchyRecorder<W> {
    options: HierarchyRecorderOptions,
    tree: Mutex<Tree>,
    spinner: ProgressBar,
    writer: Mutex<W>,
}

impl<W: WriteStr> HierarchyRecorder<W> {
    /// Creates a new recorder writing to `writer`.
    pub fn new(options: HierarchyRecorderOptions, writer: W) -> Self {
        let spinner = ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden());
        if options.show_spinner {
            spinner.set_draw_target(ProgressDrawTarget::stderr_with_hz(20));
        }
        let style = ProgressStyle::default_spinner()
            .template("{spinner} [{elapsed_precise}] {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);

        Self {
            options,
            tree: Mutex::new(Tree::default()),
            spinner,
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the recorder, returning its writer.
    pub fn into_writer(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, event: &Event, context: &EventContext<'_>) -> Option<String> {
        let mut tree = self.tree.lock().unwrap_or_else(PoisonError::into_inner);
        let instant = event.instant;

        match &event.kind {
            EventKind::RunStarted => {
                tree.run_started = Some(instant);
                if self.options.show_spinner {
                    self.spinner.enable_steady_tick(Duration::from_millis(100));
                }
            }
            EventKind::TestStarted => {
                let test = context.test?;
                self.spinner.set_message(label(test));
                *tree
                    .nodes
                    .get_or_insert_with(&test.id.key_path(), NodeData::default) = NodeData {
                    label: label(test),
                    is_suite: test.is_suite,
                    started: Some(instant),
                    ..NodeData::default()
                };
            }
            EventKind::TestSkipped(skip_info) => {
                let test = context.test?;
                *tree
                    .nodes
                    .get_or_insert_with(&test.id.key_path(), NodeData::default) = NodeData {
                    label: label(test),
                    is_suite: test.is_suite,
                    skip: Some(skip_info.clone()),
                    ..NodeData::default()
                };
            }
            EventKind::TestCancelled(skip_info) => {
                let test = context.test?;
                if let Some(data) = tree.nodes.get_mut(&test.id.key_path()) {
                    data.cancellation = Some(skip_info.clone());
                }
            }
            EventKind::IssueRecorded { issue, .. } => {
                let test = context.test?;
                let data = tree
                    .nodes
                    .get_or_insert_with(&test.id.key_path(), || NodeData {
                        label: label(test),
                        is_suite: test.is_suite,
                        ..NodeData::default()
                    });
                if issue.is_known {
                    data.known_issues += 1;
                } else if issue.severity == Severity::Warning {
                    data.warnings += 1;
                } else {
                    data.failures.push(issue.to_string());
                }
            }
            EventKind::TestEnded => {
                let test = context.test?;
                if let Some(data) = tree.nodes.get_mut(&test.id.key_path()) {
                    data.ended = Some(instant);
                }
            }
            EventKind::RunEnded => {
                tree.run_ended = Some(instant);
                self.spinner.finish_and_clear();
                return Some(render(&tree, &self.options));
            }
            _ => {}
        }
        None
    }
}

impl<W: WriteStr + Send> EventHandler for HierarchyRecorder<W> {
    fn handle_event(&self, event: &Event, context: &EventContext<'_>) {
        let Some(output) = self.update(event, context) else {
            return;
        };
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let res = writer
            .write_str(&output)
            .and_then(|()| writer.write_str_flush());
        if let Err(error) = res {
            warn!(
                error = &error as &dyn std::error::Error,
                "failed to write test hierarchy"
            );
        }
    }
}

impl<W> fmt::Debug for HierarchyRecorder<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HierarchyRecorder")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Totals {
    passed: usize,
    failed: usize,
    skipped: usize,
}

struct Renderer<'a> {
    options: &'a HierarchyRecorderOptions,
    out: String,
    totals: Totals,
}

fn render(tree: &Tree, options: &HierarchyRecorderOptions) -> String {
    let mut renderer = Renderer {
        options,
        out: String::new(),
        totals: Totals::default(),
    };
    let roots = visible_children(tree.nodes.root());
    renderer.render_children(&roots, "");

    let duration = match (tree.run_started, tree.run_ended) {
        (Some(started), Some(ended)) => ended.duration_since(started),
        _ => Duration::ZERO,
    };
    let totals = renderer.totals;
    let tests = totals.passed + totals.failed + totals.skipped;
    let symbol = if totals.failed > 0 {
        Symbol::Fail
    } else {
        Symbol::Pass {
            known_issue_count: 0,
        }
    };
    let summary = format!(
        "{} {tests} {} completed after {} seconds: {} passed, {} failed, {} skipped",
        renderer.symbol(symbol),
        plural::tests_str(tests),
        DisplaySeconds(duration),
        totals.passed,
        totals.failed,
        totals.skipped,
    );
    swrite!(renderer.out, "\n{summary}\n");
    renderer.out
}

/// Returns the nodes to render below `node`, looking through nodes that carry no data, such as
/// modules and the name nodes of test functions.
fn visible_children(node: NodeRef<'_, SmolStr, NodeData>) -> Vec<NodeRef<'_, SmolStr, NodeData>> {
    let mut visible = Vec::new();
    for child in node.children() {
        if child.value().is_some() {
            visible.push(child);
        } else {
            visible.extend(visible_children(child));
        }
    }
    visible
}

fn subtree_has_failures(node: NodeRef<'_, SmolStr, NodeData>) -> bool {
    node.pre_order()
        .filter_map(|node| node.value())
        .any(|data| !data.failures.is_empty())
}

impl Renderer<'_> {
    fn render_children(&mut self, children: &[NodeRef<'_, SmolStr, NodeData>], prefix: &str) {
        for (i, child) in children.iter().enumerate() {
            let is_last = i + 1 == children.len();
            self.render_node(*child, prefix, is_last);
        }
    }

    fn render_node(&mut self, node: NodeRef<'_, SmolStr, NodeData>, prefix: &str, is_last: bool) {
        let Some(data) = node.value() else {
            return;
        };
        let box_chars = self.options.box_chars;
        let (connector, child_prefix) = if is_last {
            (box_chars.last_branch(), format!("{prefix}{}", box_chars.blank()))
        } else {
            (box_chars.branch(), format!("{prefix}{}", box_chars.continuation()))
        };

        let symbol = self.symbol_for(node, data);
        let mut line = format!("{prefix}{connector}{} {}", self.symbol(symbol), data.label);
        if let Some(skip) = data.skip.as_ref().or(data.cancellation.as_ref())
            && let Some(comment) = &skip.comment
        {
            swrite!(line, " ({comment})");
        }
        let duration = data
            .duration()
            .map(|duration| format!("{}s", DisplaySeconds(duration)));
        self.push_line(line, duration.as_deref());

        let children = visible_children(node);
        let detail_prefix = if children.is_empty() {
            format!("{child_prefix}{}", box_chars.blank())
        } else {
            format!("{child_prefix}{}", box_chars.continuation())
        };
        for failure in &data.failures {
            let detail = truncate_with_ellipsis(failure, FAILURE_DETAIL_WIDTH, self.ellipsis());
            let line = format!("{detail_prefix}{} {detail}", self.symbol(Symbol::Details));
            self.push_line(line, None);
        }

        self.render_children(&children, &child_prefix);
    }

    fn symbol_for(&mut self, node: NodeRef<'_, SmolStr, NodeData>, data: &NodeData) -> Symbol {
        if data.is_suite {
            // A suite fails only if something within it failed: skipped children do not count.
            return if subtree_has_failures(node) {
                Symbol::Fail
            } else if data.skip.is_some() {
                Symbol::Skip
            } else {
                Symbol::Pass {
                    known_issue_count: 0,
                }
            };
        }

        if !data.failures.is_empty() {
            self.totals.failed += 1;
            Symbol::Fail
        } else if data.skip.is_some() || data.cancellation.is_some() {
            self.totals.skipped += 1;
            Symbol::Skip
        } else if data.warnings > 0 {
            self.totals.passed += 1;
            Symbol::PassWithWarnings
        } else {
            self.totals.passed += 1;
            Symbol::Pass {
                known_issue_count: data.known_issues,
            }
        }
    }

    fn symbol(&self, symbol: Symbol) -> String {
        let glyph = symbol.glyph(self.options.box_chars.uses_unicode_symbols());
        if self.options.use_ansi {
            glyph.style(symbol.style()).to_string()
        } else {
            glyph.to_owned()
        }
    }

    fn ellipsis(&self) -> &'static str {
        if self.options.box_chars.uses_unicode_symbols() {
            "\u{2026}"
        } else {
            "..."
        }
    }

    /// Appends a line, right-aligning `duration` to the duration column when it fits.
    fn push_line(&mut self, line: String, duration: Option<&str>) {
        self.out.push_str(&line);
        if let Some(duration) = duration {
            let used = text_width(&line);
            let needed = text_width(duration) + 1;
            let padding = if used + needed <= self.options.duration_column {
                self.options.duration_column - used - text_width(duration)
            } else {
                1
            };
            self.out.push_str(&" ".repeat(padding));
            if self.options.use_ansi {
                swrite!(self.out, "{}", duration.style(Style::new().dimmed()));
            } else {
                self.out.push_str(duration);
            }
        }
        self.out.push('\n');
    }
}
