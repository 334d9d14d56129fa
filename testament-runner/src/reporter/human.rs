// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-readable descriptions of events.
//!
//! [`HumanReadableRecorder`] turns events into [`Message`]s, aggregating issues per test so that
//! the message for a finished test or suite can describe everything that happened within it. The
//! other recorders in this module render these messages.

use super::{
    Symbol,
    events::{Event, EventContext, EventKind},
};
use crate::{
    graph::Graph,
    helpers::plural,
    issue::{Issue, IssueKind, Severity, SkipInfo},
    test::{Argument, Test, TestCase},
    time::{DisplaySeconds, EventInstant},
};
use itertools::Itertools;
use smol_str::SmolStr;
use std::sync::{Mutex, PoisonError};
use swrite::{SWrite, swrite};

/// A single line of human-readable output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// The symbol to prefix the line with.
    pub symbol: Symbol,

    /// The full text of the message.
    pub text: String,

    /// A shorter version of the text, for output formats with little room.
    pub concise_text: Option<String>,

    /// How deeply the line is nested below the previous message.
    pub indentation: usize,
}

impl Message {
    fn new(symbol: Symbol, text: impl Into<String>) -> Self {
        Self {
            symbol,
            text: text.into(),
            concise_text: None,
            indentation: 0,
        }
    }

    fn details(text: impl Into<String>) -> Self {
        Self {
            indentation: 1,
            ..Self::new(Symbol::Details, text)
        }
    }

    fn with_concise_text(mut self, concise_text: impl Into<String>) -> Self {
        self.concise_text = Some(concise_text.into());
        self
    }
}

/// What the recorder knows about a test, suite or test case.
#[derive(Clone, Debug, Default)]
struct TestData {
    is_suite: bool,
    is_test_case: bool,
    started: Option<EventInstant>,
    skipped: bool,
    failing_issues: usize,
    known_issues: usize,
    warnings: usize,
    cancellation: Option<SkipInfo>,
}

#[derive(Clone, Copy, Debug, Default)]
struct IssueCounts {
    failing: usize,
    known: usize,
    warnings: usize,
}

impl IssueCounts {
    fn add(mut self, data: &TestData) -> Self {
        self.failing += data.failing_issues;
        self.known += data.known_issues;
        self.warnings += data.warnings;
        self
    }

    fn describe_failure(&self) -> String {
        let mut out = format!(
            "with {} {}",
            self.failing + self.known,
            plural::issues_str(self.failing + self.known)
        );
        if self.known > 0 {
            swrite!(
                out,
                " (including {} {})",
                self.known,
                plural::known_issues_str(self.known)
            );
        }
        out
    }

    fn describe_pass(&self) -> String {
        let mut out = String::new();
        if self.warnings > 0 {
            swrite!(
                out,
                " with {} {}",
                self.warnings,
                plural::warnings_str(self.warnings)
            );
        }
        if self.known > 0 {
            swrite!(
                out,
                " (with {} {})",
                self.known,
                plural::known_issues_str(self.known)
            );
        }
        out
    }

    fn pass_symbol(&self) -> Symbol {
        if self.warnings > 0 {
            Symbol::PassWithWarnings
        } else {
            Symbol::Pass {
                known_issue_count: self.known,
            }
        }
    }
}

#[derive(Debug, Default)]
struct RecorderState {
    run_started: Option<EventInstant>,
    tests: Graph<SmolStr, TestData>,
}

/// Produces human-readable messages describing events.
///
/// The verbosity of the run's configuration selects which messages are produced:
///
/// * `-2` and below: nothing.
/// * `-1`: only the start and end of the run, and recorded issues.
/// * `0`: standard output.
/// * `1` and above: additionally, details such as expanded expectations and test case arguments.
#[derive(Debug, Default)]
pub struct HumanReadableRecorder {
    state: Mutex<RecorderState>,
}

impl HumanReadableRecorder {
    /// Creates a new recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `event`, returning the messages describing it.
    pub fn record(&self, event: &Event, context: &EventContext<'_>) -> Vec<Message> {
        let verbosity = context.configuration.verbosity;
        let messages = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(event, context, verbosity);

        if verbosity <= -2 {
            Vec::new()
        } else if verbosity == -1 {
            match event.kind {
                EventKind::RunStarted
                | EventKind::IssueRecorded { .. }
                | EventKind::RunEnded => messages,
                _ => Vec::new(),
            }
        } else {
            messages
        }
    }
}

impl RecorderState {
    fn record(
        &mut self,
        event: &Event,
        context: &EventContext<'_>,
        verbosity: i32,
    ) -> Vec<Message> {
        let instant = event.instant;
        let test = context.test;
        let test_case = context.test_case;
        let mut messages = Vec::new();

        match &event.kind {
            EventKind::RunStarted => {
                self.run_started = Some(instant);
                messages.push(Message::new(Symbol::Default, "Test run started."));
                if verbosity > 0 {
                    messages.push(Message::details(format!(
                        "testament-runner version {}",
                        env!("CARGO_PKG_VERSION")
                    )));
                    messages.push(Message::details(format!(
                        "Target platform: {}-{}",
                        std::env::consts::ARCH,
                        std::env::consts::OS
                    )));
                }
            }
            EventKind::IterationStarted { index } | EventKind::IterationEnded { index } => {
                if context
                    .configuration
                    .repetition_policy
                    .maximum_iteration_count
                    .get()
                    > 1
                {
                    let what = if matches!(event.kind, EventKind::IterationStarted { .. }) {
                        "started"
                    } else {
                        "ended"
                    };
                    messages.push(Message::new(
                        Symbol::Default,
                        format!("Iteration {index} {what}."),
                    ));
                }
            }
            EventKind::TestStarted => {
                if let Some(test) = test {
                    *self.data_mut(test, None) = TestData {
                        is_suite: test.is_suite,
                        started: Some(instant),
                        ..TestData::default()
                    };
                    messages.push(Message::new(
                        Symbol::Default,
                        format!("{} started.", label(test)),
                    ));
                }
            }
            EventKind::TestCaseStarted => {
                if let (Some(test), Some(test_case)) = (test, test_case)
                    && test.is_parameterized()
                {
                    *self.data_mut(test, Some(test_case)) = TestData {
                        is_test_case: true,
                        started: Some(instant),
                        ..TestData::default()
                    };
                    if verbosity > 0 {
                        messages.push(Message::new(
                            Symbol::Default,
                            format!(
                                "{}{} started.",
                                label(test),
                                describe_case(test_case)
                            ),
                        ));
                    }
                }
            }
            EventKind::IssueRecorded {
                issue,
                recorded_after_test_ended,
            } => {
                if let Some(test) = test {
                    let data = self.data_mut(test, test_case);
                    if issue.is_known {
                        data.known_issues += 1;
                    } else if issue.severity == Severity::Warning {
                        data.warnings += 1;
                    } else {
                        data.failing_issues += 1;
                    }
                }
                messages.extend(describe_issue(
                    issue,
                    test,
                    test_case,
                    *recorded_after_test_ended,
                    verbosity,
                ));
            }
            EventKind::ValueAttached(attachment) => {
                let target = test.map(label).unwrap_or_else(|| "the test run".to_owned());
                messages.push(Message::new(
                    Symbol::Attachment,
                    format!("Attached '{}' to {target}.", attachment.preferred_name),
                ));
            }
            EventKind::TestCaseCancelled(skip_info) => {
                if let (Some(test), Some(test_case)) = (test, test_case) {
                    self.data_mut(test, Some(test_case)).cancellation = Some(skip_info.clone());
                    messages.push(Message::new(
                        Symbol::Skip,
                        format!(
                            "{}{} was cancelled{}.",
                            label(test),
                            describe_case(test_case),
                            describe_comment(skip_info)
                        ),
                    ));
                }
            }
            EventKind::TestCancelled(skip_info) => {
                if let Some(test) = test {
                    self.data_mut(test, None).cancellation = Some(skip_info.clone());
                }
            }
            EventKind::TestCaseEnded => {
                if let (Some(test), Some(test_case)) = (test, test_case)
                    && test.is_parameterized()
                {
                    let data = self.data_mut(test, Some(test_case)).clone();
                    let counts = IssueCounts::default().add(&data);
                    let duration = describe_duration(data.started, instant);
                    let name = format!("{}{}", label(test), describe_case(test_case));
                    if counts.failing > 0 {
                        messages.push(Message::new(
                            Symbol::Fail,
                            format!("{name} failed after {duration} {}.", counts.describe_failure()),
                        ));
                    } else if data.cancellation.is_none() {
                        messages.push(Message::new(
                            counts.pass_symbol(),
                            format!("{name} passed after {duration}{}.", counts.describe_pass()),
                        ));
                    }
                }
            }
            EventKind::TestEnded => {
                if let Some(test) = test {
                    messages.push(self.describe_test_ended(test, instant));
                }
            }
            EventKind::TestSkipped(skip_info) => {
                if let Some(test) = test {
                    *self.data_mut(test, None) = TestData {
                        is_suite: test.is_suite,
                        skipped: true,
                        ..TestData::default()
                    };
                    messages.push(Message::new(
                        Symbol::Skip,
                        format!("{} skipped{}.", label(test), describe_comment(skip_info)),
                    ));
                }
            }
            EventKind::RunEnded => {
                messages.push(self.describe_run_ended(instant));
            }
            EventKind::TestDiscovered
            | EventKind::PlanStepStarted
            | EventKind::PlanStepEnded
            | EventKind::ExpectationChecked(_) => {}
        }

        messages
    }

    fn data_mut(&mut self, test: &Test, test_case: Option<&TestCase>) -> &mut TestData {
        self.tests
            .get_or_insert_with(&key_path(test, test_case), TestData::default)
    }

    fn describe_test_ended(&self, test: &Test, instant: EventInstant) -> Message {
        let key_path = test.id.key_path();
        let data = self.tests.get(&key_path).cloned().unwrap_or_default();
        let counts = self
            .tests
            .node(&key_path)
            .map(|node| {
                node.pre_order()
                    .filter_map(|node| node.value())
                    .fold(IssueCounts::default(), IssueCounts::add)
            })
            .unwrap_or_default();
        let duration = describe_duration(data.started, instant);
        let label = label(test);

        if counts.failing > 0 {
            Message::new(
                Symbol::Fail,
                format!("{label} failed after {duration} {}.", counts.describe_failure()),
            )
        } else if let Some(cancellation) = data.cancellation.filter(|_| !test.is_parameterized()) {
            Message::new(
                Symbol::Skip,
                format!(
                    "{label} was cancelled after {duration}{}.",
                    describe_comment(&cancellation)
                ),
            )
        } else {
            Message::new(
                counts.pass_symbol(),
                format!("{label} passed after {duration}{}.", counts.describe_pass()),
            )
        }
    }

    fn describe_run_ended(&self, instant: EventInstant) -> Message {
        let mut test_count = 0;
        let mut suite_count = 0;
        let mut counts = IssueCounts::default();
        for node in self.tests.iter() {
            let Some(data) = node.value() else { continue };
            counts = counts.add(data);
            if data.started.is_some() && !data.is_test_case {
                if data.is_suite {
                    suite_count += 1;
                } else {
                    test_count += 1;
                }
            }
        }

        let mut summary = format!("Test run with {test_count} {}", plural::tests_str(test_count));
        if suite_count > 0 {
            swrite!(
                summary,
                " in {suite_count} {}",
                plural::suites_str(suite_count)
            );
        }
        let duration = describe_duration(self.run_started, instant);

        if counts.failing > 0 {
            Message::new(
                Symbol::Fail,
                format!("{summary} failed after {duration} {}.", counts.describe_failure()),
            )
        } else {
            Message::new(
                counts.pass_symbol(),
                format!("{summary} passed after {duration}{}.", counts.describe_pass()),
            )
        }
    }
}

/// Returns the key under which data about `test` (or one of its cases) is aggregated.
pub(crate) fn key_path(test: &Test, test_case: Option<&TestCase>) -> Vec<SmolStr> {
    let mut key_path = test.id.key_path();
    if let Some(test_case) = test_case
        && test.is_parameterized()
    {
        key_path.push(test_case.id.key_segment());
    }
    key_path
}

/// Returns a label for `test` such as `Suite Parser` or `Test "Parses numbers"`.
pub(crate) fn label(test: &Test) -> String {
    let kind = if test.is_suite { "Suite" } else { "Test" };
    match &test.display_name {
        Some(display_name) => format!("{kind} \"{display_name}\""),
        None => format!("{kind} {}", test.name),
    }
}

/// Renders arguments as `label → value` pairs, omitting unlabeled labels.
pub fn describe_arguments(arguments: &[Argument]) -> String {
    arguments
        .iter()
        .map(|argument| {
            if argument.is_labeled() {
                format!("{} \u{2192} {}", argument.label, argument.value)
            } else {
                argument.value.clone()
            }
        })
        .join(", ")
}

fn describe_case(test_case: &TestCase) -> String {
    if test_case.arguments.is_empty() {
        return String::new();
    }
    let count = test_case.arguments.len();
    format!(
        " with {count} {} {}",
        plural::arguments_str(count),
        describe_arguments(&test_case.arguments)
    )
}

fn describe_comment(skip_info: &SkipInfo) -> String {
    match &skip_info.comment {
        Some(comment) => format!(": \"{comment}\""),
        None => String::new(),
    }
}

fn describe_duration(started: Option<EventInstant>, ended: EventInstant) -> String {
    let duration = started
        .map(|started| ended.duration_since(started))
        .unwrap_or_default();
    format!("{} seconds", DisplaySeconds(duration))
}

fn describe_issue(
    issue: &Issue,
    test: Option<&Test>,
    test_case: Option<&TestCase>,
    recorded_after_test_ended: bool,
    verbosity: i32,
) -> Vec<Message> {
    let (symbol, what) = if issue.is_known {
        (
            Symbol::Pass {
                known_issue_count: 1,
            },
            "a known issue",
        )
    } else if issue.severity == Severity::Warning {
        (Symbol::Warning, "a warning")
    } else {
        (Symbol::Fail, "an issue")
    };

    let mut text = match test {
        Some(test) => {
            let case = test_case
                .filter(|_| test.is_parameterized())
                .map(describe_case)
                .unwrap_or_default();
            format!("{}{case} recorded {what}", label(test))
        }
        None => format!("The test run recorded {what}"),
    };
    if recorded_after_test_ended {
        text.push_str(" after it ended");
    }
    if let Some(location) = &issue.source_context.source_location {
        swrite!(text, " at {location}");
    }
    swrite!(text, ": {}", issue.kind);

    let mut messages = vec![Message::new(symbol, text).with_concise_text(issue.to_string())];
    for comment in &issue.comments {
        messages.push(Message::details(comment.clone()));
    }
    if verbosity > 0
        && let IssueKind::ExpectationFailed(expectation) = &issue.kind
        && let Some(expanded) = &expectation.expanded
    {
        messages.push(Message {
            symbol: Symbol::Difference,
            ..Message::details(expanded.clone())
        });
    }
    messages
}
