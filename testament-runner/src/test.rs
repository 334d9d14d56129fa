// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test model: tests, suites and test cases.
//!
//! A [`Test`] is an immutable descriptor produced by discovery. Tests are either suites, which
//! group other tests, or functions, which have one or more [`TestCase`]s to run. Parameterized
//! functions produce their cases lazily through a generator, which the plan evaluates exactly
//! once.

use crate::{
    graph::Graph,
    issue::{TestError, TestResult},
    traits::TestTrait,
};
use futures::{FutureExt, future::BoxFuture};
use smol_str::SmolStr;
use std::{collections::BTreeSet, fmt, future::Future, sync::Arc};
use testament_metadata::{SourceLocation, Tag, TestId};

/// The executable body of a test case.
pub type TestBody = Arc<dyn Fn() -> BoxFuture<'static, TestResult> + Send + Sync>;

/// A hierarchy of tests keyed by their ID key paths.
pub type TestGraph = Graph<SmolStr, Arc<Test>>;

/// A generator producing the test cases of a parameterized test.
pub type TestCaseGenerator = Arc<dyn Fn() -> Result<Vec<TestCase>, TestError> + Send + Sync>;

/// Wraps an async closure into a [`TestBody`].
pub fn body<F, Fut>(f: F) -> TestBody
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TestResult> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// A test or suite.
#[derive(Clone)]
pub struct Test {
    /// The name of the test, for example `insertion()`.
    pub name: SmolStr,

    /// A custom name to display instead of `name`.
    pub display_name: Option<String>,

    /// The stable, hierarchical ID.
    pub id: TestId,

    /// Whether this is a suite.
    pub is_suite: bool,

    /// Whether this suite was inferred from the hierarchy rather than declared.
    pub is_synthesized: bool,

    /// The traits applied to this test, including traits inherited from suites once the test has
    /// been planned. Inherited traits come first.
    pub traits: Vec<Arc<dyn TestTrait>>,

    /// The test cases of a function, or `None` for a suite.
    pub test_cases: Option<TestCases>,

    /// Where the test was declared.
    pub source_location: Option<SourceLocation>,
}

impl Test {
    /// Creates a suite with the given ID.
    ///
    /// The suite's name is the last component of its ID.
    pub fn suite(id: TestId) -> Self {
        Self {
            name: name_from_id(&id),
            display_name: None,
            source_location: id.source_location.clone(),
            id: TestId {
                source_location: None,
                ..id
            },
            is_suite: true,
            is_synthesized: false,
            traits: Vec::new(),
            test_cases: None,
        }
    }

    /// Creates a non-parameterized test function.
    ///
    /// The function's source location is taken from its ID.
    pub fn function<F, Fut>(id: TestId, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TestResult> + Send + 'static,
    {
        Self::with_test_cases(id, TestCases::Single(body(f)))
    }

    /// Creates a parameterized test function whose cases are produced by `generator`.
    pub fn parameterized<G>(id: TestId, generator: G) -> Self
    where
        G: Fn() -> Result<Vec<TestCase>, TestError> + Send + Sync + 'static,
    {
        Self::with_test_cases(id, TestCases::Generator(Arc::new(generator)))
    }

    fn with_test_cases(id: TestId, test_cases: TestCases) -> Self {
        Self {
            name: name_from_id(&id),
            display_name: None,
            source_location: id.source_location.clone(),
            id,
            is_suite: false,
            is_synthesized: false,
            traits: Vec::new(),
            test_cases: Some(test_cases),
        }
    }

    /// Synthesizes a suite for a key path that has descendants but no declaration.
    pub(crate) fn synthesized_suite(id: TestId, source_location: Option<SourceLocation>) -> Self {
        Self {
            is_synthesized: true,
            source_location,
            ..Self::suite(id)
        }
    }

    /// Adds a trait.
    pub fn with_trait(mut self, test_trait: impl TestTrait + 'static) -> Self {
        self.traits.push(Arc::new(test_trait));
        self
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Sets the source location.
    pub fn with_source_location(mut self, source_location: SourceLocation) -> Self {
        self.source_location = Some(source_location);
        self
    }

    /// Returns the display name if set, and the name otherwise.
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Returns true if this test is a parameterized function.
    pub fn is_parameterized(&self) -> bool {
        match &self.test_cases {
            None | Some(TestCases::Single(_)) => false,
            Some(TestCases::Generator(_) | TestCases::Evaluated(_)) => true,
        }
    }

    /// Returns the union of the tags of all traits applied to this test.
    pub fn tags(&self) -> BTreeSet<Tag> {
        self.traits
            .iter()
            .flat_map(|t| t.tags().iter().cloned())
            .collect()
    }

    /// Returns true if any trait hides this test from filters.
    pub fn is_hidden(&self) -> bool {
        self.traits.iter().any(|t| t.is_hidden())
    }

    /// Returns the evaluated test cases, if the plan has evaluated them.
    pub fn evaluated_test_cases(&self) -> Option<&[Arc<TestCase>]> {
        match &self.test_cases {
            Some(TestCases::Evaluated(cases)) => Some(cases),
            _ => None,
        }
    }
}

fn name_from_id(id: &TestId) -> SmolStr {
    id.name().cloned().unwrap_or_else(|| id.module.clone())
}

impl fmt::Debug for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Test")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("is_suite", &self.is_suite)
            .field("is_synthesized", &self.is_synthesized)
            .field("traits", &self.traits)
            .field("source_location", &self.source_location)
            .finish_non_exhaustive()
    }
}

/// The cases of a test function.
#[derive(Clone)]
pub enum TestCases {
    /// A non-parameterized function with a single body.
    Single(TestBody),

    /// A parameterized function whose cases have not been generated yet.
    Generator(TestCaseGenerator),

    /// The cases of a parameterized function after generation, in declaration order.
    Evaluated(Vec<Arc<TestCase>>),
}

impl TestCases {
    /// Produces the concrete cases, running the generator if necessary.
    pub(crate) fn evaluate(&self) -> Result<Vec<Arc<TestCase>>, TestError> {
        match self {
            TestCases::Single(body) => Ok(vec![Arc::new(TestCase {
                id: TestCaseId::default(),
                arguments: Vec::new(),
                body: body.clone(),
            })]),
            TestCases::Generator(generator) => {
                Ok(generator()?.into_iter().map(Arc::new).collect())
            }
            TestCases::Evaluated(cases) => Ok(cases.clone()),
        }
    }
}

/// The stable ID of a test case: the indexes of its arguments within their collections.
///
/// Non-parameterized test cases have an empty ID.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestCaseId(Vec<u32>);

impl TestCaseId {
    /// Creates an ID from argument indexes.
    pub fn new(indexes: impl IntoIterator<Item = u32>) -> Self {
        Self(indexes.into_iter().collect())
    }

    /// Returns the key segment under which this case is nested below its test, such as `#0.2`.
    pub fn key_segment(&self) -> SmolStr {
        SmolStr::new(format!("#{self}"))
    }
}

impl fmt::Display for TestCaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for index in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{index}")?;
            first = false;
        }
        Ok(())
    }
}

/// An argument passed to a parameterized test case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Argument {
    /// The parameter label, or `_` if it has none.
    pub label: SmolStr,

    /// A description of the value.
    pub value: String,
}

impl Argument {
    /// The label used for parameters without a name.
    pub const UNLABELED: &'static str = "_";

    /// Creates a new argument.
    pub fn new(label: impl Into<SmolStr>, value: impl fmt::Debug) -> Self {
        Self {
            label: label.into(),
            value: format!("{value:?}"),
        }
    }

    /// Returns true if this argument has a meaningful label.
    pub fn is_labeled(&self) -> bool {
        self.label != Self::UNLABELED
    }
}

/// A single invocation of a test function.
#[derive(Clone)]
pub struct TestCase {
    /// The stable ID of this case.
    pub id: TestCaseId,

    /// The arguments of this case, in parameter order. Empty for non-parameterized tests.
    pub arguments: Vec<Argument>,

    /// The body to run.
    pub body: TestBody,
}

impl TestCase {
    /// Creates a parameterized test case.
    pub fn parameterized<F, Fut>(id: TestCaseId, arguments: Vec<Argument>, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TestResult> + Send + 'static,
    {
        Self {
            id,
            arguments,
            body: body(f),
        }
    }

    /// Returns true if this case has arguments.
    pub fn is_parameterized(&self) -> bool {
        !self.arguments.is_empty()
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("id", &self.id)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{HiddenTrait, Tags};

    #[test]
    fn suite_drops_location_from_id() {
        let location = SourceLocation::new("Suite.rs", 3, 1);
        let suite = Test::suite(
            TestId::new("Module", ["Suite"]).with_source_location(location.clone()),
        );
        assert_eq!(suite.id.source_location, None);
        assert_eq!(suite.source_location, Some(location));
        assert_eq!(suite.name, "Suite");
        assert_eq!(suite.id.key_path(), vec!["Module", "Suite"]);
    }

    #[test]
    fn function_properties() {
        let location = SourceLocation::new("Suite.rs", 10, 5);
        let test = Test::function(
            TestId::new("Module", ["Suite", "works()"]).with_source_location(location.clone()),
            || async { Ok(()) },
        )
        .with_trait(Tags::new(["slow", "net"]))
        .with_trait(Tags::new(["slow"]))
        .with_display_name("It works");

        assert!(!test.is_suite);
        assert!(!test.is_parameterized());
        assert_eq!(test.display_name(), "It works");
        assert_eq!(test.source_location, Some(location));
        assert_eq!(
            test.tags(),
            [Tag::new("net"), Tag::new("slow")].into_iter().collect()
        );
        assert!(!test.is_hidden());
        assert!(test.with_trait(HiddenTrait).is_hidden());
    }

    #[test]
    fn evaluate_cases() {
        let single = TestCases::Single(body(|| async { Ok(()) }));
        let cases = single.evaluate().unwrap();
        assert_eq!(cases.len(), 1);
        assert!(!cases[0].is_parameterized());
        assert_eq!(cases[0].id.key_segment(), "#");

        let generator = TestCases::Generator(Arc::new(|| {
            Ok((0..3)
                .map(|i| {
                    TestCase::parameterized(
                        TestCaseId::new([i, 1]),
                        vec![Argument::new("x", i)],
                        || async { Ok(()) },
                    )
                })
                .collect())
        }));
        let cases = generator.evaluate().unwrap();
        assert_eq!(cases.len(), 3);
        assert_eq!(cases[2].id.to_string(), "2.1");
        assert_eq!(cases[2].id.key_segment(), "#2.1");
        assert_eq!(cases[2].arguments[0].value, "2");
    }

    #[test]
    fn unlabeled_arguments() {
        assert!(!Argument::new(Argument::UNLABELED, "v").is_labeled());
        assert!(Argument::new("label", "v").is_labeled());
        assert_eq!(Argument::new("s", "v").value, "\"v\"");
    }
}
