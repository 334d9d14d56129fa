// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::Result;
use fixture_data::testament_tests::EXPECTED_TESTS;
use indoc::indoc;
use maplit::btreeset;
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use testament_runner::{
    Tag, TestId,
    config::{ConfigFile, Configuration},
    errors::ConfigValidationError,
    reporter::EventKind,
    test::Test,
    test_filter::TestFilter,
    traits::Tags,
};

fn started_tests(log: &EventLog) -> BTreeSet<String> {
    log.events()
        .into_iter()
        .filter(|event| matches!(event.kind, EventKind::TestStarted) && !event.is_suite)
        .filter_map(|event| event.test)
        .collect()
}

fn expected_names(predicate: impl Fn(&str, &[&str]) -> bool) -> BTreeSet<String> {
    EXPECTED_TESTS
        .iter()
        .filter(|fixture| predicate(fixture.name, &fixture.tags))
        .map(|fixture| fixture.name.to_owned())
        .collect()
}

#[tokio::test]
async fn suite_tags_are_inherited() -> Result<()> {
    let tests = [
        Test::suite(TestId::new("Net", ["Slow"])).with_trait(Tags::new(["slow"])),
        function("Net.Slow.downloads()", 2, passes),
        function("Net.pings()", 5, passes),
    ];
    let filter = TestFilter::including_any_of([Tag::new("slow")]);
    let (_, log) = run_logged(tests, Configuration::default().with_test_filter(filter)).await?;

    assert_eq!(
        started_tests(&log),
        btreeset! {"Net.Slow.downloads()".to_owned()}
    );
    Ok(())
}

#[tokio::test]
async fn pattern_filters() -> Result<()> {
    let filter = TestFilter::including_patterns([r"^Network\."])?;
    let (_, log) = run_logged(
        fixture_tests(),
        Configuration::default().with_test_filter(filter),
    )
    .await?;

    assert_eq!(
        started_tests(&log),
        expected_names(|name, _| name.starts_with("Network."))
    );
    Ok(())
}

#[tokio::test]
async fn filters_from_config_file() -> Result<()> {
    let config = ConfigFile::from_toml_str(indoc! {r#"
        [filter]
        include-tags = ["slow"]
        exclude-patterns = ["warns"]
    "#})?;
    let configuration = config.apply(Configuration::default())?;
    let (_, log) = run_logged(fixture_tests(), configuration).await?;

    assert_eq!(
        started_tests(&log),
        expected_names(|name, tags| tags.contains(&"slow") && !name.contains("warns"))
    );
    Ok(())
}

#[test]
fn invalid_patterns_are_rejected_eagerly() -> Result<()> {
    let config = ConfigFile::from_toml_str(indoc! {r#"
        [filter]
        include-patterns = ["(unclosed"]
    "#})?;
    let error = config
        .apply(Configuration::default())
        .expect_err("pattern is invalid");
    assert!(
        matches!(error, ConfigValidationError::Filter(_)),
        "{error:?}"
    );
    Ok(())
}
