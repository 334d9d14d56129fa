// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The events posted during a test run.
//!
//! Events are produced by a [`Runner`](crate::runner::Runner) and consumed by an
//! [`EventHandler`], typically one of the recorders in this module's parent.
//!
//! Events for a single test are always delivered in order: its start precedes its issues, test
//! cases and end. Events for different tests running in parallel may interleave.

use crate::{
    attachment::Attachment,
    config::Configuration,
    issue::{Expectation, Issue, SkipInfo},
    test::{Test, TestCase},
    time::EventInstant,
};

/// An event posted during a test run.
#[derive(Clone, Debug)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,

    /// When it happened.
    pub instant: EventInstant,
}

impl Event {
    /// Creates an event that happened now.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            instant: EventInstant::now(),
        }
    }
}

/// The kind of an [`Event`].
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum EventKind {
    /// A test was discovered. Posted for every planned test before the run starts, including
    /// tests that will be skipped.
    TestDiscovered,

    /// The run started.
    RunStarted,

    /// An iteration of the plan started.
    IterationStarted {
        /// The 1-based index of the iteration.
        index: usize,
    },

    /// A plan step started.
    PlanStepStarted,

    /// A test started running.
    TestStarted,

    /// A test case started running.
    TestCaseStarted,

    /// An issue was recorded.
    IssueRecorded {
        /// The issue.
        issue: Issue,

        /// True if the issue was recorded after its test had already ended, for example from a
        /// task that outlived the test.
        recorded_after_test_ended: bool,
    },

    /// A value was attached to the running test.
    ValueAttached(Attachment),

    /// An expectation was checked. Only delivered if enabled in the configuration.
    ExpectationChecked(Expectation),

    /// A test case finished running.
    TestCaseEnded,

    /// A test case was cancelled.
    TestCaseCancelled(SkipInfo),

    /// A test was cancelled.
    TestCancelled(SkipInfo),

    /// A test finished running.
    TestEnded,

    /// A test was skipped instead of running.
    TestSkipped(SkipInfo),

    /// A plan step ended. Posted for every step that started, whatever its action.
    PlanStepEnded,

    /// An iteration of the plan ended.
    IterationEnded {
        /// The 1-based index of the iteration.
        index: usize,
    },

    /// The run ended.
    RunEnded,
}

impl EventKind {
    /// Returns a short, stable name for this kind of event, suitable for logging.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::TestDiscovered => "test-discovered",
            EventKind::RunStarted => "run-started",
            EventKind::IterationStarted { .. } => "iteration-started",
            EventKind::PlanStepStarted => "plan-step-started",
            EventKind::TestStarted => "test-started",
            EventKind::TestCaseStarted => "test-case-started",
            EventKind::IssueRecorded { .. } => "issue-recorded",
            EventKind::ValueAttached(_) => "value-attached",
            EventKind::ExpectationChecked(_) => "expectation-checked",
            EventKind::TestCaseEnded => "test-case-ended",
            EventKind::TestCaseCancelled(_) => "test-case-cancelled",
            EventKind::TestCancelled(_) => "test-cancelled",
            EventKind::TestEnded => "test-ended",
            EventKind::TestSkipped(_) => "test-skipped",
            EventKind::PlanStepEnded => "plan-step-ended",
            EventKind::IterationEnded { .. } => "iteration-ended",
            EventKind::RunEnded => "run-ended",
        }
    }
}

/// The context an [`Event`] was posted in.
#[derive(Clone, Copy, Debug)]
pub struct EventContext<'a> {
    /// The test the event relates to, if any.
    pub test: Option<&'a Test>,

    /// The test case the event relates to, if any.
    pub test_case: Option<&'a TestCase>,

    /// The 1-based iteration the event was posted in, or `None` outside of iterations.
    pub iteration: Option<usize>,

    /// The configuration of the run.
    pub configuration: &'a Configuration,
}

/// A consumer of events.
///
/// Handlers are called concurrently from every task of a run, so they must synchronize any
/// state they keep.
pub trait EventHandler: Send + Sync {
    /// Handles a single event.
    fn handle_event(&self, event: &Event, context: &EventContext<'_>);
}

impl<F> EventHandler for F
where
    F: Fn(&Event, &EventContext<'_>) + Send + Sync,
{
    fn handle_event(&self, event: &Event, context: &EventContext<'_>) {
        self(event, context)
    }
}

/// An event handler that discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEventHandler;

impl EventHandler for NoopEventHandler {
    fn handle_event(&self, _event: &Event, _context: &EventContext<'_>) {}
}

/// An event handler that forwards every event to each of several handlers, in order.
#[derive(Default)]
pub struct FanOutEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl FanOutEventHandler {
    /// Creates an empty fan-out handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }
}

impl EventHandler for FanOutEventHandler {
    fn handle_event(&self, event: &Event, context: &EventContext<'_>) {
        for handler in &self.handlers {
            handler.handle_event(event, context);
        }
    }
}
