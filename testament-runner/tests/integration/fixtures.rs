// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use color_eyre::eyre::Result;
use fixture_data::{
    models::{FixtureOutcome, TestFixture},
    testament_tests::EXPECTED_TESTS,
};
use std::sync::{Arc, Mutex};
use testament_runner::{
    TestId,
    config::Configuration,
    issue::{Issue, IssueKind, Severity, SkipInfo, TestError, TestResult},
    record_issue,
    reporter::{Event, EventContext, EventHandler, EventKind},
    runner::{RunStats, Runner},
    test::Test,
    traits::Tags,
    with_known_issue,
};

/// Builds a runnable test behaving as `fixture` describes.
pub(crate) fn fixture_test(fixture: &TestFixture) -> Test {
    let outcome = fixture.outcome;
    let test = Test::function(fixture.test_id(), move || run_outcome(outcome));
    if fixture.tags.is_empty() {
        test
    } else {
        test.with_trait(Tags::new(fixture.tags()))
    }
}

/// Builds every test in the fixture catalog.
pub(crate) fn fixture_tests() -> Vec<Test> {
    EXPECTED_TESTS.iter().map(fixture_test).collect()
}

async fn run_outcome(outcome: FixtureOutcome) -> TestResult {
    match outcome {
        FixtureOutcome::Pass => Ok(()),
        FixtureOutcome::Fail => Err(TestError::msg("attempted to divide by zero")),
        FixtureOutcome::Panic => panic!("fixture panicked"),
        FixtureOutcome::Skip => Err(SkipInfo::new("skipped by fixture").into()),
        FixtureOutcome::KnownIssue => {
            with_known_issue("upstream is flaky", async {
                record_issue(Issue::new(IssueKind::Unconditional));
                Ok(())
            })
            .await
        }
        FixtureOutcome::Warning => {
            record_issue(Issue::new(IssueKind::Unconditional).with_severity(Severity::Warning));
            Ok(())
        }
    }
}

/// Returns a function test with a source location on the given line.
pub(crate) fn function<F, Fut>(name: &str, line: u32, body: F) -> Test
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TestResult> + Send + 'static,
{
    let mut parts = name.split('.');
    let module = parts.next().unwrap_or(name);
    Test::function(
        TestId::new(module, parts).with_source_location(testament_runner::SourceLocation::new(
            "Integration.rs",
            line,
            1,
        )),
        body,
    )
}

/// A passing test body.
pub(crate) async fn passes() -> TestResult {
    Ok(())
}

/// An event as seen by [`EventLog`].
#[derive(Clone, Debug)]
pub(crate) struct RecordedEvent {
    pub(crate) kind: EventKind,
    pub(crate) test: Option<String>,
    pub(crate) is_suite: bool,
    pub(crate) test_case: Option<String>,
    pub(crate) iteration: Option<usize>,
}

impl RecordedEvent {
    pub(crate) fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Collects every event of a run.
#[derive(Clone, Debug, Default)]
pub(crate) struct EventLog {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl EventLog {
    pub(crate) fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Returns the names of the events posted for the test with the given display name.
    pub(crate) fn names_for(&self, test: &str) -> Vec<&'static str> {
        self.events()
            .iter()
            .filter(|event| event.test.as_deref() == Some(test))
            .map(RecordedEvent::name)
            .collect()
    }
}

impl EventHandler for EventLog {
    fn handle_event(&self, event: &Event, context: &EventContext<'_>) {
        self.events.lock().unwrap().push(RecordedEvent {
            kind: event.kind.clone(),
            test: context.test.map(|test| test.id.to_string()),
            is_suite: context.test.is_some_and(|test| test.is_suite),
            test_case: context
                .test_case
                .filter(|case| case.is_parameterized())
                .map(|case| case.id.key_segment().to_string()),
            iteration: context.iteration,
        });
    }
}

/// Runs `tests`, collecting their events.
pub(crate) async fn run_logged(
    tests: impl IntoIterator<Item = Test>,
    configuration: Configuration,
) -> Result<(RunStats, EventLog)> {
    let log = EventLog::default();
    let runner = Runner::new(tests, configuration.with_event_handler(log.clone()))?;
    let stats = runner.run().await;
    Ok((stats, log))
}
