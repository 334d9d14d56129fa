// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, bail};
use fixture_data::testament_tests::{EXPECTED_TESTS, expected_failure_count};
use pretty_assertions::assert_eq;
use quick_xml::{
    Reader,
    events::{BytesStart, Event as XmlEvent},
};
use std::collections::BTreeMap;
use testament_runner::{
    config::Configuration,
    reporter::{JunitRecorder, TESTSUITE_NAME},
    runner::Runner,
    test::Test,
    write_str::SharedBuffer,
};

#[derive(Debug, Default)]
struct Report {
    suites: Vec<BTreeMap<String, String>>,
    testcases: Vec<TestcaseReport>,
}

#[derive(Debug, Default)]
struct TestcaseReport {
    classname: String,
    name: String,
    children: Vec<String>,
}

fn attributes(start: &BytesStart<'_>) -> Result<BTreeMap<String, String>> {
    let mut attributes = BTreeMap::new();
    for attribute in start.attributes() {
        let attribute = attribute?;
        attributes.insert(
            String::from_utf8(attribute.key.as_ref().to_vec())?,
            attribute.unescape_value()?.into_owned(),
        );
    }
    Ok(attributes)
}

fn parse_report(xml: &str) -> Result<Report> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut report = Report::default();
    let mut in_testcase = false;
    loop {
        let (start, is_empty) = match reader.read_event()? {
            XmlEvent::Start(start) => (start, false),
            XmlEvent::Empty(start) => (start, true),
            XmlEvent::End(end) => {
                if end.name().as_ref() == b"testcase" {
                    in_testcase = false;
                }
                continue;
            }
            XmlEvent::Eof => break,
            _ => continue,
        };
        let name = String::from_utf8(start.name().as_ref().to_vec())?;
        match name.as_str() {
            "testsuites" => {}
            "testsuite" => report.suites.push(attributes(&start)?),
            "testcase" => {
                let mut attributes = attributes(&start)?;
                report.testcases.push(TestcaseReport {
                    classname: attributes.remove("classname").unwrap_or_default(),
                    name: attributes.remove("name").unwrap_or_default(),
                    children: Vec::new(),
                });
                in_testcase = !is_empty;
            }
            "failure" | "skipped" if in_testcase => {
                if let Some(testcase) = report.testcases.last_mut() {
                    testcase.children.push(name);
                }
            }
            other => bail!("unexpected element <{other}>"),
        }
    }
    Ok(report)
}

async fn junit_report(
    tests: impl IntoIterator<Item = Test>,
    configuration: Configuration,
) -> Result<Report> {
    let buffer = SharedBuffer::new();
    let recorder = JunitRecorder::new(buffer.clone());
    let runner = Runner::new(tests, configuration.with_event_handler(recorder))?;
    runner.run().await;
    let xml = buffer.contents();
    assert!(
        xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#),
        "{xml}"
    );
    parse_report(&xml)
}

#[tokio::test]
async fn passing_tests_report() -> Result<()> {
    let tests = [
        function("A.one()", 1, passes),
        function("A.two()", 2, passes),
        function("B.one()", 3, passes),
    ];
    let report = junit_report(tests, Configuration::default().with_parallelization(false)).await?;

    assert_eq!(report.suites.len(), 1);
    let suite = &report.suites[0];
    assert_eq!(suite["name"], TESTSUITE_NAME);
    assert_eq!(suite["tests"], "3");
    assert_eq!(suite["failures"], "0");
    assert_eq!(suite["skipped"], "0");
    assert_eq!(suite["errors"], "0");

    let names: Vec<_> = report
        .testcases
        .iter()
        .map(|testcase| (testcase.classname.as_str(), testcase.name.as_str()))
        .collect();
    assert_eq!(names, [("A", "one()"), ("A", "two()"), ("B", "one()")]);
    assert!(
        report
            .testcases
            .iter()
            .all(|testcase| testcase.children.is_empty())
    );
    Ok(())
}

#[tokio::test]
async fn markup_in_names_survives() -> Result<()> {
    let name = "quote\"<&>\u{e9}\u{1f600}()";
    let report = junit_report(
        [function(&format!("Odd.{name}"), 1, passes)],
        Configuration::default(),
    )
    .await?;

    assert_eq!(report.testcases.len(), 1);
    assert_eq!(report.testcases[0].classname, "Odd");
    assert_eq!(report.testcases[0].name, name);
    Ok(())
}

#[tokio::test]
async fn fixture_catalog_report() -> Result<()> {
    let report = junit_report(fixture_tests(), Configuration::default()).await?;

    let suite = &report.suites[0];
    assert_eq!(suite["tests"], EXPECTED_TESTS.len().to_string());
    assert_eq!(suite["failures"], expected_failure_count().to_string());
    assert_eq!(suite["skipped"], "1");

    assert_eq!(report.testcases.len(), EXPECTED_TESTS.len());
    for testcase in &report.testcases {
        let Some(fixture) = EXPECTED_TESTS
            .iter()
            .find(|fixture| fixture.function_name() == testcase.name)
        else {
            bail!("unexpected testcase {testcase:?}");
        };
        assert_eq!(testcase.classname, fixture.classname());

        let expected_children: &[&str] = if fixture.outcome.is_failure() {
            &["failure"]
        } else if fixture.outcome == fixture_data::models::FixtureOutcome::Skip {
            &["skipped"]
        } else {
            &[]
        };
        assert_eq!(testcase.children, expected_children, "{testcase:?}");
    }
    Ok(())
}
