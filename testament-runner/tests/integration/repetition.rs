// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::Result;
use pretty_assertions::assert_eq;
use std::num::NonZeroUsize;
use test_case::test_case;
use testament_runner::{
    config::{Configuration, Continuation, RepetitionPolicy},
    issue::TestError,
    reporter::EventKind,
    test::Test,
};

fn always_fails() -> Test {
    function("Module.always_fails()", 1, || async {
        Err(TestError::msg("always fails"))
    })
}

fn never_fails() -> Test {
    function("Module.never_fails()", 1, passes)
}

#[test_case(Continuation::UntilIssueRecorded, always_fails(), 1 ; "until issue, failing")]
#[test_case(Continuation::UntilIssueRecorded, never_fails(), 5 ; "until issue, passing")]
#[test_case(Continuation::WhileIssueRecorded, always_fails(), 5 ; "while issue, failing")]
#[test_case(Continuation::WhileIssueRecorded, never_fails(), 1 ; "while issue, passing")]
#[test_case(Continuation::Always, always_fails(), 5 ; "always, failing")]
#[tokio::test]
async fn repetition_terminates(
    continuation: Continuation,
    test: Test,
    expected_iterations: usize,
) -> Result<()> {
    let policy = RepetitionPolicy::repeating(continuation, NonZeroUsize::new(5).unwrap());
    let (stats, log) = run_logged(
        [test],
        Configuration::default().with_repetition_policy(policy),
    )
    .await?;

    assert_eq!(stats.iterations, expected_iterations);
    assert_eq!(stats.tests_started, expected_iterations);

    // Iterations are numbered from 1, both in iteration events and in the context of every
    // event posted within an iteration.
    let started: Vec<_> = log
        .events()
        .into_iter()
        .filter_map(|event| match event.kind {
            EventKind::IterationStarted { index } => Some(index),
            _ => None,
        })
        .collect();
    assert_eq!(started, (1..=expected_iterations).collect::<Vec<_>>());

    let test_started_iterations: Vec<_> = log
        .events()
        .into_iter()
        .filter(|event| matches!(event.kind, EventKind::TestStarted))
        .map(|event| event.iteration)
        .collect();
    assert_eq!(
        test_started_iterations,
        (1..=expected_iterations).map(Some).collect::<Vec<_>>()
    );
    Ok(())
}
