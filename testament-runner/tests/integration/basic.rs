// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use fixture_data::testament_tests::{EXPECTED_TESTS, expected_failure_count};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use testament_metadata::TestamentExitCode;
use testament_runner::{
    config::Configuration,
    expect_eq,
    issue::{IssueKind, TestError},
    reporter::{
        Event, EventContext, EventKind, FanOutEventHandler, HumanReadableRecorder, Message, Symbol,
    },
    runner::Runner,
    with_known_issue,
};

#[tokio::test]
async fn fixture_catalog() -> Result<()> {
    let (stats, log) = run_logged(fixture_tests(), Configuration::default()).await?;

    // Three suites are synthesized: Basics.Arithmetic, Basics.Strings and Network.Http.
    assert_eq!(stats.steps, EXPECTED_TESTS.len() + 3);
    assert_eq!(stats.tests_started, EXPECTED_TESTS.len());
    assert_eq!(stats.suites_started, 3);
    assert_eq!(stats.failing_issues, expected_failure_count());
    assert_eq!(stats.known_issues, 1);
    assert_eq!(stats.issues, expected_failure_count() + 2, "failures, known issue and warning");
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.tests_skipped, 0);
    assert_eq!(stats.iterations, 1);
    assert_eq!(stats.exit_code(), TestamentExitCode::TEST_RUN_FAILED);

    for fixture in EXPECTED_TESTS.iter() {
        let name = fixture.test_id().to_string();
        let names = log.names_for(&name);
        ensure!(
            names.first() == Some(&"test-discovered"),
            "{name} was discovered first: {names:?}"
        );
        ensure!(
            names.contains(&"test-started") && names.contains(&"test-ended"),
            "{name} ran: {names:?}"
        );

        let failing_issues = log
            .events()
            .iter()
            .filter(|event| event.test.as_deref() == Some(name.as_str()))
            .filter(|event| {
                matches!(&event.kind, EventKind::IssueRecorded { issue, .. } if issue.is_failure())
            })
            .count();
        assert_eq!(
            failing_issues,
            usize::from(fixture.outcome.is_failure()),
            "failing issues for {name}"
        );
    }

    Ok(())
}

#[tokio::test]
async fn thrown_errors_fail_the_test() -> Result<()> {
    let human = Arc::new(HumanReadableRecorder::new());
    let messages: Arc<Mutex<Vec<Message>>> = Arc::default();
    let log = EventLog::default();
    let handler = FanOutEventHandler::new().with(log.clone()).with({
        let messages = messages.clone();
        move |event: &Event, context: &EventContext<'_>| {
            if matches!(event.kind, EventKind::TestEnded) {
                messages
                    .lock()
                    .unwrap()
                    .extend(human.record(event, context));
            } else {
                human.record(event, context);
            }
        }
    });

    let test = function("Module.throws()", 1, || async {
        Err(TestError::msg("the network is down"))
    });
    let runner = Runner::new([test], Configuration::default().with_event_handler(handler))?;
    let stats = runner.run().await;
    assert_eq!(stats.failing_issues, 1);

    let events = log.events();
    let ended = events
        .iter()
        .position(|event| matches!(event.kind, EventKind::TestEnded))
        .expect("test ended");
    let issues: Vec<_> = events
        .iter()
        .enumerate()
        .filter_map(|(i, event)| match &event.kind {
            EventKind::IssueRecorded { issue, .. } => Some((i, issue.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(issues.len(), 1);
    assert!(issues[0].0 < ended, "issue is recorded before the test ends");
    assert_eq!(
        issues[0].1.kind,
        IssueKind::ErrorCaught("the network is down".to_owned())
    );

    let messages = messages.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].symbol, Symbol::Fail);
    assert!(
        messages[0].text.starts_with("Test throws() failed after "),
        "{}",
        messages[0].text
    );
    assert!(messages[0].text.ends_with(" with 1 issue."), "{}", messages[0].text);
    Ok(())
}

#[tokio::test]
async fn expectations_and_known_issues() -> Result<()> {
    let tests = [
        function("Module.mismatch()", 1, || async {
            expect_eq(1 + 1, 3);
            Ok(())
        }),
        function("Module.never_recorded()", 2, || {
            with_known_issue("should have failed", async { Ok(()) })
        }),
    ];
    let (stats, log) = run_logged(tests, Configuration::default()).await?;
    assert_eq!(stats.failing_issues, 2);

    let kinds: Vec<_> = log
        .events()
        .into_iter()
        .filter_map(|event| match event.kind {
            EventKind::IssueRecorded { issue, .. } => Some((event.test, issue.kind)),
            _ => None,
        })
        .collect();
    assert_eq!(kinds.len(), 2);
    for (test, kind) in kinds {
        match test.as_deref() {
            Some("Module.mismatch()") => {
                assert!(
                    matches!(&kind, IssueKind::ExpectationFailed(expectation) if !expectation.is_passing),
                    "{kind:?}"
                );
            }
            Some("Module.never_recorded()") => {
                assert_eq!(kind, IssueKind::KnownIssueNotRecorded);
            }
            other => panic!("unexpected issue for {other:?}"),
        }
    }
    Ok(())
}

#[test]
fn blocking_run_and_exit_codes() -> Result<()> {
    let runner = Runner::new(
        [function("Module.passes()", 1, passes)],
        Configuration::default(),
    )?;
    let stats = runner.run_blocking()?;
    assert_eq!(stats.tests_started, 1);
    assert_eq!(stats.exit_code(), TestamentExitCode::OK);

    let empty = Runner::new(Vec::new(), Configuration::default())?;
    assert!(empty.plan().is_empty());
    assert_eq!(
        empty.run_blocking()?.exit_code(),
        TestamentExitCode::NO_TESTS_RUN
    );
    Ok(())
}
