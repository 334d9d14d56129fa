// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data models for fixture information.

use iddqd::{IdOrdItem, id_upcast};
use testament_metadata::{SourceLocation, Tag, TestId};

/// The file every fixture test claims to be declared in.
pub const FIXTURE_FILE: &str = "Fixtures.rs";

/// A test function in the fixture catalog.
#[derive(Clone, Debug)]
pub struct TestFixture {
    /// The dotted name of the test, such as `Module.Suite.function()`.
    pub name: &'static str,
    /// The line the test is declared on in [`FIXTURE_FILE`].
    pub line: u32,
    /// What the test does when run.
    pub outcome: FixtureOutcome,
    /// The tags applied to the test.
    pub tags: Vec<&'static str>,
}

impl TestFixture {
    pub fn new(name: &'static str, line: u32, outcome: FixtureOutcome) -> Self {
        Self {
            name,
            line,
            outcome,
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = &'static str>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Returns the ID of the test, including its source location.
    pub fn test_id(&self) -> TestId {
        let mut parts = self.name.split('.');
        let module = parts.next().unwrap_or(self.name);
        TestId::new(module, parts).with_source_location(self.source_location())
    }

    pub fn source_location(&self) -> SourceLocation {
        SourceLocation::new(FIXTURE_FILE, self.line, 1)
    }

    /// Returns the ID of the suite enclosing this test, if there is one.
    pub fn suite_id(&self) -> Option<TestId> {
        let id = self.test_id();
        (id.components.len() > 1).then(|| {
            TestId::new(
                id.module.clone(),
                id.components[..id.components.len() - 1].iter().cloned(),
            )
        })
    }

    /// Returns the module and enclosing suites as a dotted string, as used for JUnit class names.
    pub fn classname(&self) -> &'static str {
        self.name
            .rsplit_once('.')
            .map_or(self.name, |(classname, _)| classname)
    }

    /// Returns the last component of the name.
    pub fn function_name(&self) -> &'static str {
        self.name
            .rsplit_once('.')
            .map_or(self.name, |(_, name)| name)
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.tags.iter().map(|tag| Tag::new(*tag))
    }
}

impl IdOrdItem for TestFixture {
    type Key<'a> = &'a str;

    fn key(&self) -> Self::Key<'_> {
        self.name
    }

    id_upcast!();
}

/// What a fixture test does when run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FixtureOutcome {
    /// Returns successfully.
    Pass,
    /// Returns an error.
    Fail,
    /// Panics.
    Panic,
    /// Skips itself from its body.
    Skip,
    /// Records an issue inside a known-issue scope.
    KnownIssue,
    /// Records a warning.
    Warning,
}

impl FixtureOutcome {
    /// Returns true if the test records a failing issue.
    pub fn is_failure(self) -> bool {
        matches!(self, FixtureOutcome::Fail | FixtureOutcome::Panic)
    }
}
