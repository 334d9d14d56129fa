// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use pretty_assertions::assert_eq;
use std::{
    collections::BTreeMap,
    sync::{Arc, OnceLock},
};
use testament_runner::{
    config::Configuration,
    reporter::EventKind,
    runner::Runner,
};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn serial_siblings_run_in_source_order() -> Result<()> {
    // Declared out of order on purpose.
    let tests = [
        function("Beta.last()", 40, passes),
        function("Alpha.Suite.third()", 30, passes),
        function("Alpha.Suite.first()", 10, passes),
        function("Alpha.Suite.second()", 20, passes),
    ];
    let (_, log) = run_logged(
        tests,
        Configuration::default().with_parallelization(false),
    )
    .await?;

    let started: Vec<_> = log
        .events()
        .into_iter()
        .filter(|event| matches!(event.kind, EventKind::TestStarted) && !event.is_suite)
        .filter_map(|event| event.test)
        .collect();
    assert_eq!(
        started,
        [
            "Alpha.Suite.first()",
            "Alpha.Suite.second()",
            "Alpha.Suite.third()",
            "Beta.last()",
        ]
    );
    Ok(())
}

/// Checks that every step's events are properly nested, returning the number of steps seen.
fn check_pairing(log: &EventLog) -> Result<usize> {
    #[derive(Default)]
    struct Counts {
        step_started: Option<usize>,
        step_ended: Option<usize>,
        test_started: Vec<usize>,
        test_ended: Vec<usize>,
    }

    let mut counts: BTreeMap<String, Counts> = BTreeMap::new();
    for (index, event) in log.events().into_iter().enumerate() {
        let Some(test) = event.test else { continue };
        let counts = counts.entry(test.clone()).or_default();
        match event.kind {
            EventKind::PlanStepStarted => {
                ensure!(counts.step_started.is_none(), "{test} started twice");
                counts.step_started = Some(index);
            }
            EventKind::PlanStepEnded => {
                ensure!(counts.step_ended.is_none(), "{test} ended twice");
                counts.step_ended = Some(index);
            }
            EventKind::TestStarted => counts.test_started.push(index),
            EventKind::TestEnded => counts.test_ended.push(index),
            _ => {}
        }
    }

    let mut steps = 0;
    for (test, counts) in &counts {
        let Some(step_started) = counts.step_started else {
            ensure!(
                counts.test_started.is_empty(),
                "{test} started without a plan step"
            );
            continue;
        };
        steps += 1;
        let Some(step_ended) = counts.step_ended else {
            color_eyre::eyre::bail!("plan step for {test} never ended");
        };
        ensure!(step_started < step_ended, "{test}: step ended before it started");
        ensure!(
            counts.test_started.len() == counts.test_ended.len() && counts.test_started.len() <= 1,
            "{test}: unbalanced test events"
        );
        if let (Some(started), Some(ended)) =
            (counts.test_started.first(), counts.test_ended.first())
        {
            ensure!(
                step_started < *started && started < ended && *ended < step_ended,
                "{test}: test events are not nested within its plan step"
            );
        }
    }
    Ok(steps)
}

#[tokio::test]
async fn events_are_paired() -> Result<()> {
    let (stats, log) = run_logged(fixture_tests(), Configuration::default()).await?;
    let steps = check_pairing(&log)?;
    assert_eq!(steps, stats.steps);
    Ok(())
}

#[tokio::test]
async fn events_are_paired_under_cancellation() -> Result<()> {
    let token: Arc<OnceLock<CancellationToken>> = Arc::default();
    let cancel = {
        let token = token.clone();
        move || {
            let token = token.clone();
            async move {
                if let Some(token) = token.get() {
                    token.cancel();
                }
                Ok(())
            }
        }
    };
    let tests = [
        function("Module.Suite.first()", 1, passes),
        function("Module.Suite.cancels()", 2, cancel),
        function("Module.Suite.never_runs()", 3, passes),
        function("Module.Other.never_runs()", 10, passes),
    ];

    let log = EventLog::default();
    let runner = Runner::new(
        tests,
        Configuration::default()
            .with_parallelization(false)
            .with_event_handler(log.clone()),
    )?;
    token
        .set(runner.cancellation_token())
        .expect("token is only set once");
    let stats = runner.run().await;

    assert_eq!(stats.tests_started, 2);
    check_pairing(&log)?;
    assert!(log.names_for("Module.Suite.never_runs()") == ["test-discovered"]);
    assert!(log.names_for("Module.Other.never_runs()") == ["test-discovered"]);
    assert_eq!(
        log.names_for("Module.Suite").last(),
        Some(&"plan-step-ended"),
        "the suite's step still ends"
    );
    Ok(())
}
