// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JUnit XML output.
//!
//! The prolog and the opening `<testsuites>` tag are written as soon as the run starts. Everything
//! else is accumulated and serialized once the run ends.

use super::events::{Event, EventContext, EventHandler, EventKind};
use crate::{
    errors::{JunitWriteError, WriteEventError},
    graph::Graph,
    issue::{Issue, SkipInfo},
    test::Test,
    time::{DisplaySeconds, EventInstant},
    write_str::WriteStr,
};
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event as XmlEvent},
};
use smol_str::SmolStr;
use std::{
    fmt,
    sync::{Mutex, PoisonError},
    time::Duration,
};
use swrite::{SWrite, swrite};
use tracing::warn;

static TESTSUITES_TAG: &str = "testsuites";
static TESTSUITE_TAG: &str = "testsuite";
static TESTCASE_TAG: &str = "testcase";
static FAILURE_TAG: &str = "failure";
static SKIPPED_TAG: &str = "skipped";

/// The name of the single `<testsuite>` element.
pub static TESTSUITE_NAME: &str = "TestResults";

#[derive(Clone, Debug, Default)]
struct TestData {
    is_suite: bool,
    classname: String,
    name: String,
    started: Option<EventInstant>,
    ended: Option<EventInstant>,
    issues: Vec<Issue>,
    skip: Option<SkipInfo>,
}

impl TestData {
    fn new(test: &Test) -> Self {
        let mut classname = test.id.module.to_string();
        let (name, parents) = match test.id.components.split_last() {
            Some((name, parents)) => (name.to_string(), parents),
            None => (test.id.module.to_string(), &[][..]),
        };
        for parent in parents {
            swrite!(classname, ".{parent}");
        }
        Self {
            is_suite: test.is_suite,
            classname,
            name,
            ..Self::default()
        }
    }

    fn duration(&self) -> Option<Duration> {
        Some(self.ended?.duration_since(self.started?))
    }
}

struct State<W> {
    xml: Writer<Vec<u8>>,
    output: W,
    run_started: Option<EventInstant>,
    tests: Graph<SmolStr, TestData>,
    last_error: Option<WriteEventError>,
}

/// Writes a JUnit XML report of the run.
pub struct JunitRecorder<W> {
    state: Mutex<State<W>>,
}

impl<W: WriteStr> JunitRecorder<W> {
    /// Creates a new recorder writing to `output`.
    pub fn new(output: W) -> Self {
        Self {
            state: Mutex::new(State {
                xml: Writer::new_with_indent(Vec::new(), b' ', 2),
                output,
                run_started: None,
                tests: Graph::new(),
                last_error: None,
            }),
        }
    }

    /// Returns the most recent error encountered while writing the report, clearing it.
    pub fn take_error(&self) -> Option<WriteEventError> {
        self.lock().last_error.take()
    }

    /// Consumes the recorder, returning its output.
    pub fn into_output(self) -> W {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .output
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State<W>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: WriteStr> State<W> {
    fn record(&mut self, event: &Event, context: &EventContext<'_>) -> Result<(), WriteEventError> {
        let instant = event.instant;
        match &event.kind {
            EventKind::RunStarted => {
                self.run_started = Some(instant);
                serialize_prolog(&mut self.xml)?;
                self.flush()?;
            }
            EventKind::TestStarted => {
                if let Some(test) = context.test {
                    *self.data_mut(test) = TestData {
                        started: Some(instant),
                        ..TestData::new(test)
                    };
                }
            }
            EventKind::IssueRecorded { issue, .. } => {
                if let Some(test) = context.test
                    && issue.is_failure()
                {
                    self.data_mut(test).issues.push(issue.clone());
                }
            }
            EventKind::TestSkipped(skip_info) => {
                if let Some(test) = context.test {
                    *self.data_mut(test) = TestData {
                        skip: Some(skip_info.clone()),
                        ..TestData::new(test)
                    };
                }
            }
            EventKind::TestCancelled(skip_info) => {
                if let Some(test) = context.test {
                    self.data_mut(test).skip = Some(skip_info.clone());
                }
            }
            EventKind::TestEnded => {
                if let Some(test) = context.test {
                    self.data_mut(test).ended = Some(instant);
                }
            }
            EventKind::RunEnded => {
                let duration = self
                    .run_started
                    .map(|started| instant.duration_since(started))
                    .unwrap_or_default();
                serialize_results(&self.tests, duration, &mut self.xml)?;
                self.flush()?;
                self.output.write_str("\n")?;
                self.output.write_str_flush()?;
            }
            _ => {}
        }
        Ok(())
    }

    fn data_mut(&mut self, test: &Test) -> &mut TestData {
        self.tests
            .get_or_insert_with(&test.id.key_path(), || TestData::new(test))
    }

    /// Moves serialized XML to the output.
    fn flush(&mut self) -> Result<(), WriteEventError> {
        let bytes = std::mem::take(self.xml.get_mut());
        self.output.write_str(&String::from_utf8_lossy(&bytes))?;
        Ok(())
    }
}

impl<W: WriteStr + Send> EventHandler for JunitRecorder<W> {
    fn handle_event(&self, event: &Event, context: &EventContext<'_>) {
        let mut state = self.lock();
        if let Err(error) = state.record(event, context) {
            warn!(
                event = event.kind.name(),
                error = &error as &dyn std::error::Error,
                "failed to write JUnit report"
            );
            state.last_error = Some(error);
        }
    }
}

impl<W> fmt::Debug for JunitRecorder<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JunitRecorder").finish_non_exhaustive()
    }
}

fn serialize_prolog(writer: &mut Writer<Vec<u8>>) -> Result<(), JunitWriteError> {
    let decl = BytesDecl::new("1.0", Some("UTF-8"), None);
    writer.write_event(XmlEvent::Decl(decl))?;
    writer.write_event(XmlEvent::Start(BytesStart::new(TESTSUITES_TAG)))?;
    Ok(())
}

fn serialize_results(
    tests: &Graph<SmolStr, TestData>,
    duration: Duration,
    writer: &mut Writer<Vec<u8>>,
) -> Result<(), JunitWriteError> {
    let mut test_count = 0;
    let mut failure_count = 0;
    let mut skipped_count = 0;
    for data in tests.iter().filter_map(|node| node.value()) {
        failure_count += data.issues.len();
        if !data.is_suite {
            test_count += 1;
            if data.skip.is_some() {
                skipped_count += 1;
            }
        }
    }

    writer.write_event(XmlEvent::Start(start_tag(
        TESTSUITE_TAG,
        &[
            ("name", TESTSUITE_NAME),
            ("errors", "0"),
            ("tests", &test_count.to_string()),
            ("failures", &failure_count.to_string()),
            ("skipped", &skipped_count.to_string()),
            ("time", &serialize_time(duration)),
        ],
    )))?;

    for data in tests.iter().filter_map(|node| node.value()) {
        if !data.is_suite {
            serialize_testcase(data, writer)?;
        }
    }

    serialize_end_tag(TESTSUITE_TAG, writer)?;
    serialize_end_tag(TESTSUITES_TAG, writer)?;
    Ok(())
}

fn serialize_testcase(
    data: &TestData,
    writer: &mut Writer<Vec<u8>>,
) -> Result<(), JunitWriteError> {
    let time = data.duration().map(serialize_time);
    let mut attributes = vec![
        ("classname", data.classname.as_str()),
        ("name", data.name.as_str()),
    ];
    if let Some(time) = &time {
        attributes.push(("time", time));
    }

    if data.issues.is_empty() && data.skip.is_none() {
        writer.write_event(XmlEvent::Empty(empty_tag(TESTCASE_TAG, &attributes)))?;
        return Ok(());
    }

    writer.write_event(XmlEvent::Start(start_tag(TESTCASE_TAG, &attributes)))?;
    for issue in &data.issues {
        let message = issue.to_string();
        writer.write_event(XmlEvent::Empty(empty_tag(
            FAILURE_TAG,
            &[("message", &message)],
        )))?;
    }
    if let Some(skip) = &data.skip {
        match &skip.comment {
            Some(comment) => {
                writer.write_event(XmlEvent::Start(BytesStart::new(SKIPPED_TAG)))?;
                writer.write_event(XmlEvent::Text(BytesText::from_escaped(escape(comment))))?;
                serialize_end_tag(SKIPPED_TAG, writer)?;
            }
            None => {
                writer.write_event(XmlEvent::Empty(empty_tag(SKIPPED_TAG, &[])))?;
            }
        }
    }
    serialize_end_tag(TESTCASE_TAG, writer)?;
    Ok(())
}

fn serialize_end_tag(
    tag_name: &'static str,
    writer: &mut Writer<Vec<u8>>,
) -> Result<(), JunitWriteError> {
    writer.write_event(XmlEvent::End(BytesEnd::new(tag_name)))?;
    Ok(())
}

fn start_tag(tag_name: &str, attributes: &[(&str, &str)]) -> BytesStart<'static> {
    BytesStart::from_content(tag_content(tag_name, attributes), tag_name.len())
}

/// Returns a tag for an empty element, rendered as `<name attr="value" />`.
fn empty_tag(tag_name: &str, attributes: &[(&str, &str)]) -> BytesStart<'static> {
    let mut content = tag_content(tag_name, attributes);
    content.push(' ');
    BytesStart::from_content(content, tag_name.len())
}

fn tag_content(tag_name: &str, attributes: &[(&str, &str)]) -> String {
    let mut content = tag_name.to_owned();
    for (key, value) in attributes {
        swrite!(content, " {key}=\"{}\"", escape(value));
    }
    content
}

fn serialize_time(duration: Duration) -> String {
    DisplaySeconds(duration).to_string()
}

/// Escapes text for use in XML attributes and text nodes.
///
/// Markup characters, newlines and all non-ASCII characters are written as numeric character
/// references.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' | '<' | '>' | '&' | '\n' | '\r' => swrite!(escaped, "&#{};", u32::from(c)),
            c if !c.is_ascii() => swrite!(escaped, "&#{};", u32::from(c)),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Configuration, issue::IssueKind, write_str::SharedBuffer};
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use quick_xml::Reader;
    use regex::Regex;
    use test_strategy::proptest;
    use testament_metadata::{SourceLocation, TestId};

    fn function(components: &[&str], line: u32) -> Test {
        Test::function(
            TestId::new("Module", components.iter().copied())
                .with_source_location(SourceLocation::new("T.rs", line, 1)),
            || async { Ok(()) },
        )
    }

    fn post(recorder: &JunitRecorder<SharedBuffer>, kind: EventKind, test: Option<&Test>) {
        let configuration = Configuration::default();
        let context = EventContext {
            test,
            test_case: None,
            iteration: Some(1),
            configuration: &configuration,
        };
        recorder.handle_event(&Event::new(kind), &context);
    }

    #[test]
    fn escapes_markup_and_non_ascii() {
        assert_eq!(escape("plain text"), "plain text");
        assert_eq!(
            escape("a<b & \"c\">\n\u{e9}"),
            "a&#60;b &#38; &#34;c&#34;&#62;&#10;&#233;"
        );
    }

    #[proptest]
    fn escaped_attributes_round_trip(value: String) {
        let xml = format!("<t a=\"{}\"/>", escape(&value));
        let mut reader = Reader::from_str(&xml);
        match reader.read_event().unwrap() {
            XmlEvent::Empty(tag) => {
                let attribute = tag.try_get_attribute("a").unwrap().unwrap();
                assert_eq!(attribute.unescape_value().unwrap(), value);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn writes_report() {
        let buffer = SharedBuffer::new();
        let recorder = JunitRecorder::new(buffer.clone());
        let suite = Test::suite(TestId::new("Module", ["Suite"]));
        let passes = function(&["Suite", "passes()"], 2);
        let fails = function(&["Suite", "fails()"], 3);
        let skipped = function(&["Suite", "skipped()"], 4);

        post(&recorder, EventKind::RunStarted, None);
        assert_eq!(
            buffer.contents(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<testsuites>"
        );

        post(&recorder, EventKind::TestStarted, Some(&suite));
        post(&recorder, EventKind::TestStarted, Some(&passes));
        post(&recorder, EventKind::TestEnded, Some(&passes));
        post(&recorder, EventKind::TestStarted, Some(&fails));
        post(
            &recorder,
            EventKind::IssueRecorded {
                issue: Issue::new(IssueKind::ErrorCaught("<boom>".to_owned())),
                recorded_after_test_ended: false,
            },
            Some(&fails),
        );
        post(
            &recorder,
            EventKind::IssueRecorded {
                issue: Issue::new(IssueKind::Unconditional).known(),
                recorded_after_test_ended: false,
            },
            Some(&fails),
        );
        post(&recorder, EventKind::TestEnded, Some(&fails));
        post(
            &recorder,
            EventKind::TestSkipped(SkipInfo::new("not \u{fc}berall")),
            Some(&skipped),
        );
        post(&recorder, EventKind::TestEnded, Some(&suite));
        post(&recorder, EventKind::RunEnded, None);
        assert!(recorder.take_error().is_none());

        let times = Regex::new(r#"time="\d+\.\d{3}""#).unwrap();
        let output = times.replace_all(&buffer.contents(), "time=\"T\"").into_owned();
        assert_eq!(
            output,
            indoc! {r#"
                <?xml version="1.0" encoding="UTF-8"?>
                <testsuites>
                  <testsuite name="TestResults" errors="0" tests="3" failures="1" skipped="1" time="T">
                    <testcase classname="Module.Suite" name="passes()" time="T" />
                    <testcase classname="Module.Suite" name="fails()" time="T">
                      <failure message="Caught error: &#60;boom&#62;" />
                    </testcase>
                    <testcase classname="Module.Suite" name="skipped()">
                      <skipped>not &#252;berall</skipped>
                    </testcase>
                  </testsuite>
                </testsuites>
            "#}
        );
    }
}
