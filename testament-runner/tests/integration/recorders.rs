// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, eyre};
use indoc::indoc;
use pretty_assertions::assert_eq;
use regex::Regex;
use std::collections::BTreeMap;
use testament_runner::{
    TestId,
    config::Configuration,
    reporter::{
        ConsoleRecorder, ConsoleRecorderOptions, FanOutEventHandler, HierarchyRecorder,
        HierarchyRecorderOptions,
    },
    runner::Runner,
    test::Test,
    traits::ConditionTrait,
    write_str::SharedBuffer,
};

fn plain_console_options() -> ConsoleRecorderOptions {
    ConsoleRecorderOptions {
        use_ansi: false,
        use_256_colors: false,
        use_unicode: false,
        tag_colors: BTreeMap::new(),
    }
}

#[tokio::test]
async fn hierarchy_of_a_skipped_leaf() -> Result<()> {
    let tests = [
        Test::suite(TestId::new("Module", ["Suite"])),
        function("Module.Suite.passes()", 2, passes),
        function("Module.Suite.skipped()", 3, passes)
            .with_trait(ConditionTrait::disabled("not on this platform")),
    ];
    let buffer = SharedBuffer::new();
    let recorder = HierarchyRecorder::new(HierarchyRecorderOptions::default(), buffer.clone());
    let runner = Runner::new(
        tests,
        Configuration::default()
            .with_parallelization(false)
            .with_event_handler(recorder),
    )?;
    let stats = runner.run().await;
    assert_eq!(stats.tests_started, 1);
    assert_eq!(stats.tests_skipped, 1);

    let duration = Regex::new(r"\s+\d+\.\d{3}s$")?;
    let output = buffer
        .contents()
        .lines()
        .map(|line| duration.replace(line, "").into_owned())
        .collect::<Vec<_>>()
        .join("\n");
    let (tree, summary) = output
        .split_once("\n\n")
        .ok_or_else(|| eyre!("no summary in {output}"))?;
    assert_eq!(
        tree,
        indoc! {"
            `-- + Suite Suite
                |-- + Test passes()
                `-- > Test skipped() (not on this platform)"}
    );
    assert!(summary.ends_with(": 1 passed, 0 failed, 1 skipped"), "{summary}");
    Ok(())
}

#[tokio::test]
async fn recorders_share_a_run() -> Result<()> {
    let console = SharedBuffer::new();
    let hierarchy = SharedBuffer::new();
    let handler = FanOutEventHandler::new()
        .with(ConsoleRecorder::new(plain_console_options(), console.clone()))
        .with(HierarchyRecorder::new(
            HierarchyRecorderOptions::default(),
            hierarchy.clone(),
        ));
    let runner = Runner::new(fixture_tests(), Configuration::default().with_event_handler(handler))?;
    runner.run().await;

    let console = console.contents();
    let last = console.lines().last().unwrap_or_default();
    assert!(
        last.starts_with("X Test run with 10 tests in 3 suites failed after "),
        "{console}"
    );
    assert!(
        last.ends_with(" with 3 issues (including 1 known issue)."),
        "{last}"
    );
    assert!(
        console.contains("> Test skipped() was cancelled after "),
        "{console}"
    );

    let hierarchy = hierarchy.contents();
    assert!(
        hierarchy.contains(": 7 passed, 2 failed, 1 skipped"),
        "{hierarchy}"
    );
    Ok(())
}
