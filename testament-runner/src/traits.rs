// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Traits that customize how tests are planned and run.
//!
//! Every trait implements [`TestTrait`]. The plan consults traits to decide whether a test runs
//! (through [`TestTrait::prepare`]), and the runner consults them for time limits,
//! serialization, issue handling and custom execution scopes.
//!
//! Recursive traits applied to a suite are inherited by everything within that suite.

use crate::{
    issue::{Issue, SkipInfo, SourceContext, TestError, TestResult},
    test::{Test, TestCase},
};
use debug_ignore::DebugIgnore;
use futures::future::BoxFuture;
use std::{fmt, sync::Arc, time::Duration};
use testament_metadata::Tag;

/// A trait applied to a test or suite.
///
/// All methods have defaults, so implementations only override what they need.
pub trait TestTrait: fmt::Debug + Send + Sync {
    /// Prepares the trait for `test` during planning.
    ///
    /// Returning a [`SkipInfo`] (converted into a [`TestError`]) skips the test. Any other error
    /// causes an issue to be recorded for the test instead of running it.
    fn prepare(&self, _test: &Test) -> Result<(), TestError> {
        Ok(())
    }

    /// Whether this trait, applied to a suite, is inherited by everything within it.
    fn is_recursive(&self) -> bool {
        false
    }

    /// Returns a scope to run `test` (or `test_case`) within, if any.
    ///
    /// For suites, this is called once with `test_case` set to `None`. For functions, it is
    /// called once per test case.
    fn scope_provider(
        &self,
        _test: &Test,
        _test_case: Option<&TestCase>,
    ) -> Option<Arc<dyn TestScoping>> {
        None
    }

    /// The tags this trait applies.
    fn tags(&self) -> &[Tag] {
        &[]
    }

    /// The time limit this trait imposes, if any.
    fn time_limit(&self) -> Option<Duration> {
        None
    }

    /// Whether this trait disables parallel execution.
    fn is_serialized(&self) -> bool {
        false
    }

    /// Whether this trait hides the test from filters.
    fn is_hidden(&self) -> bool {
        false
    }

    /// Returns a handler for issues recorded within the test, if any.
    fn issue_handler(&self) -> Option<&dyn IssueHandler> {
        None
    }
}

/// The continuation passed to [`TestScoping::provide_scope`].
pub type ScopeNext = Box<dyn FnOnce() -> BoxFuture<'static, TestResult> + Send>;

/// Middleware wrapping the execution of a test or test case.
///
/// Implementations must call `next` exactly once to run the test, and may perform work before
/// and after doing so. When several scopes apply, the first declared trait is the outermost.
pub trait TestScoping: Send + Sync {
    /// Runs `next` within this scope.
    fn provide_scope(
        &self,
        test: Arc<Test>,
        test_case: Option<Arc<TestCase>>,
        next: ScopeNext,
    ) -> BoxFuture<'static, TestResult>;
}

impl<F> TestScoping for F
where
    F: Fn(Arc<Test>, Option<Arc<TestCase>>, ScopeNext) -> BoxFuture<'static, TestResult>
        + Send
        + Sync,
{
    fn provide_scope(
        &self,
        test: Arc<Test>,
        test_case: Option<Arc<TestCase>>,
        next: ScopeNext,
    ) -> BoxFuture<'static, TestResult> {
        self(test, test_case, next)
    }
}

/// Inspects, transforms or suppresses issues before they are delivered.
pub trait IssueHandler: Send + Sync {
    /// Returns the issue to deliver, or `None` to suppress it.
    fn handle_issue(&self, issue: Issue) -> Option<Issue>;
}

/// Applies tags to a test or suite.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tags {
    tags: Vec<Tag>,
}

impl Tags {
    /// Creates a new tag trait.
    pub fn new<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Tag>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

impl TestTrait for Tags {
    fn is_recursive(&self) -> bool {
        true
    }

    fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

type ConditionFn = Arc<dyn Fn() -> Result<bool, TestError> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ConditionKind {
    EnabledIf,
    DisabledIf,
}

/// Enables or disables a test based on a condition evaluated during planning.
#[derive(Clone, Debug)]
pub struct ConditionTrait {
    kind: ConditionKind,
    condition: DebugIgnore<ConditionFn>,
    comment: Option<String>,
    source_context: SourceContext,
}

impl ConditionTrait {
    /// Unconditionally disables a test.
    #[track_caller]
    pub fn disabled(comment: impl Into<String>) -> Self {
        Self::new(
            ConditionKind::DisabledIf,
            Arc::new(|| Ok(true)),
            Some(comment.into()),
        )
    }

    /// Enables a test only if `condition` returns true.
    #[track_caller]
    pub fn enabled_if<F>(condition: F, comment: impl Into<String>) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self::new(
            ConditionKind::EnabledIf,
            Arc::new(move || Ok(condition())),
            Some(comment.into()),
        )
    }

    /// Disables a test if `condition` returns true.
    #[track_caller]
    pub fn disabled_if<F>(condition: F, comment: impl Into<String>) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self::new(
            ConditionKind::DisabledIf,
            Arc::new(move || Ok(condition())),
            Some(comment.into()),
        )
    }

    /// Enables a test only if `condition` returns `Ok(true)`.
    ///
    /// If `condition` fails, an issue is recorded for the test instead of running it.
    #[track_caller]
    pub fn try_enabled_if<F>(condition: F, comment: impl Into<String>) -> Self
    where
        F: Fn() -> Result<bool, TestError> + Send + Sync + 'static,
    {
        Self::new(
            ConditionKind::EnabledIf,
            Arc::new(condition),
            Some(comment.into()),
        )
    }

    #[track_caller]
    fn new(kind: ConditionKind, condition: ConditionFn, comment: Option<String>) -> Self {
        Self {
            kind,
            condition: DebugIgnore(condition),
            comment,
            source_context: SourceContext::caller(),
        }
    }
}

impl TestTrait for ConditionTrait {
    fn prepare(&self, _test: &Test) -> Result<(), TestError> {
        let value = (self.condition)()?;
        let enabled = match self.kind {
            ConditionKind::EnabledIf => value,
            ConditionKind::DisabledIf => !value,
        };
        if enabled {
            Ok(())
        } else {
            Err(SkipInfo {
                comment: self.comment.clone(),
                source_context: self.source_context.clone(),
            }
            .into())
        }
    }

    fn is_recursive(&self) -> bool {
        true
    }
}

/// Limits how long each test case may run.
///
/// When several time limits apply to a test, the shortest one wins.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeLimitTrait {
    limit: Duration,
}

impl TimeLimitTrait {
    /// Creates a new time limit.
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }
}

impl TestTrait for TimeLimitTrait {
    fn is_recursive(&self) -> bool {
        true
    }

    fn time_limit(&self) -> Option<Duration> {
        Some(self.limit)
    }
}

/// Controls parallel execution of a test's cases and children.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParallelizationTrait {
    _private: (),
}

impl ParallelizationTrait {
    /// Runs the test cases and children of the test serially.
    pub fn serialized() -> Self {
        Self { _private: () }
    }
}

impl TestTrait for ParallelizationTrait {
    fn is_recursive(&self) -> bool {
        true
    }

    fn is_serialized(&self) -> bool {
        true
    }
}

type IssueHandlerFn = Arc<dyn Fn(Issue) -> Option<Issue> + Send + Sync>;

/// Filters or transforms issues recorded within a test.
#[derive(Clone, Debug)]
pub struct IssueHandlingTrait {
    handler: DebugIgnore<IssueHandlerFn>,
}

impl IssueHandlingTrait {
    /// Only delivers issues for which `predicate` returns true.
    pub fn filter<F>(predicate: F) -> Self
    where
        F: Fn(&Issue) -> bool + Send + Sync + 'static,
    {
        Self::transform(move |issue| predicate(&issue).then_some(issue))
    }

    /// Replaces each issue with the result of `transform`, suppressing it if that is `None`.
    pub fn transform<F>(transform: F) -> Self
    where
        F: Fn(Issue) -> Option<Issue> + Send + Sync + 'static,
    {
        Self {
            handler: DebugIgnore(Arc::new(transform)),
        }
    }
}

impl IssueHandler for IssueHandlingTrait {
    fn handle_issue(&self, issue: Issue) -> Option<Issue> {
        (self.handler)(issue)
    }
}

impl TestTrait for IssueHandlingTrait {
    fn is_recursive(&self) -> bool {
        true
    }

    fn issue_handler(&self) -> Option<&dyn IssueHandler> {
        Some(self)
    }
}

/// Hides a test from filters unless hidden tests are explicitly included.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HiddenTrait;

impl TestTrait for HiddenTrait {
    fn is_hidden(&self) -> bool {
        true
    }
}

/// Runs a test within a custom [`TestScoping`].
#[derive(Clone)]
pub struct ScopeTrait {
    scope: Arc<dyn TestScoping>,
    recursive: bool,
}

impl ScopeTrait {
    /// Creates a new scope trait applying only to the test it is attached to.
    pub fn new(scope: impl TestScoping + 'static) -> Self {
        Self {
            scope: Arc::new(scope),
            recursive: false,
        }
    }

    /// Makes the scope apply to every test within the suite it is attached to, rather than to the
    /// suite itself.
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }
}

impl fmt::Debug for ScopeTrait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeTrait")
            .field("recursive", &self.recursive)
            .finish_non_exhaustive()
    }
}

impl TestTrait for ScopeTrait {
    fn is_recursive(&self) -> bool {
        self.recursive
    }

    fn scope_provider(
        &self,
        test: &Test,
        _test_case: Option<&TestCase>,
    ) -> Option<Arc<dyn TestScoping>> {
        // A recursive scope on a suite is provided to its children instead.
        if test.is_suite && self.recursive {
            None
        } else {
            Some(self.scope.clone())
        }
    }
}
