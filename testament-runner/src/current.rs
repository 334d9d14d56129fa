// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers available to test bodies while they run.
//!
//! The runner establishes a task-local context for every test and test case it runs. The
//! functions in this module record issues, check expectations and attach values against that
//! context. Called outside of a running test, they log a warning and do nothing.
//!
//! Task-local contexts do not propagate to tasks spawned with `tokio::spawn`. To record issues
//! from such a task, obtain an [`IssueRecorder`] first and move it into the task.

use crate::{
    attachment::Attachment,
    issue::{Expectation, Issue, IssueKind, SourceContext, TestResult, source_location_of},
    reporter::events::EventKind,
    runner::EventPoster,
    test::{Test, TestCase},
};
use camino::Utf8Path;
use std::{
    fmt,
    future::Future,
    panic::Location,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use tracing::warn;

tokio::task_local! {
    static CURRENT: TestContext;
}

/// The context of the running test or test case.
#[derive(Clone)]
pub(crate) struct TestContext {
    pub(crate) test: Arc<Test>,
    pub(crate) test_case: Option<Arc<TestCase>>,
    pub(crate) poster: EventPoster,
    pub(crate) ended: Arc<AtomicBool>,
    known_issue: Option<Arc<KnownIssueScope>>,
}

impl TestContext {
    pub(crate) fn new(
        test: Arc<Test>,
        test_case: Option<Arc<TestCase>>,
        poster: EventPoster,
    ) -> Self {
        Self {
            test,
            test_case,
            poster,
            ended: Arc::new(AtomicBool::new(false)),
            known_issue: None,
        }
    }

    /// Runs `fut` with this context as the current one.
    pub(crate) async fn scope<F: Future>(self, fut: F) -> F::Output {
        CURRENT.scope(self, fut).await
    }

    /// Marks the test or test case as ended. Issues recorded afterwards are flagged.
    pub(crate) fn end(&self) {
        self.ended.store(true, Ordering::Release);
    }

    fn try_current() -> Option<Self> {
        CURRENT.try_with(Clone::clone).ok()
    }

    /// Records `issue`, returning false if an issue handler suppressed it.
    pub(crate) fn record(&self, mut issue: Issue) -> bool {
        if let Some(scope) = &self.known_issue {
            scope.matched.fetch_add(1, Ordering::AcqRel);
            issue = issue.known();
            if let Some(comment) = &scope.comment {
                issue = issue.with_comment(comment.clone());
            }
        }

        let Some(issue) = apply_issue_handlers(&self.test, issue) else {
            return false;
        };
        self.poster.post(
            EventKind::IssueRecorded {
                issue,
                recorded_after_test_ended: self.ended.load(Ordering::Acquire),
            },
            Some(&self.test),
            self.test_case.as_deref(),
        );
        true
    }

    fn post(&self, kind: EventKind) {
        self.poster
            .post(kind, Some(&self.test), self.test_case.as_deref());
    }
}

/// Passes `issue` through the issue handlers of `test`, in trait order.
pub(crate) fn apply_issue_handlers(test: &Test, issue: Issue) -> Option<Issue> {
    test.traits
        .iter()
        .filter_map(|t| t.issue_handler())
        .try_fold(issue, |issue, handler| handler.handle_issue(issue))
}

struct KnownIssueScope {
    comment: Option<String>,
    matched: AtomicUsize,
}

#[track_caller]
fn warn_outside_test(operation: &str) {
    let location = Location::caller();
    warn!(
        "{operation} was called outside of a running test at {}",
        source_location_of(location)
    );
}

/// Records an issue against the running test or test case.
///
/// Returns false if there is no running test, or if an issue handler suppressed the issue.
#[track_caller]
pub fn record_issue(issue: Issue) -> bool {
    match TestContext::try_current() {
        Some(context) => context.record(issue),
        None => {
            warn_outside_test("record_issue");
            false
        }
    }
}

/// Records an [`IssueKind::Unconditional`] issue with `comment`, attributed to the caller.
#[track_caller]
pub fn record_comment(comment: impl Into<String>) -> bool {
    record_issue(
        Issue::new(IssueKind::Unconditional)
            .with_comment(comment)
            .with_source_context(SourceContext::caller()),
    )
}

/// Checks that `condition` holds, recording an issue if it does not.
///
/// Returns `condition`.
#[track_caller]
pub fn expect(condition: bool, comment: impl Into<String>) -> bool {
    let comment = comment.into();
    check(Expectation {
        is_passing: condition,
        expression: comment.clone(),
        expanded: None,
        comment: Some(comment),
        source_location: Some(source_location_of(Location::caller())),
    })
}

/// Checks that `lhs == rhs`, recording an issue describing both values if they differ.
///
/// Returns true if the values are equal.
#[track_caller]
pub fn expect_eq<T, U>(lhs: T, rhs: U) -> bool
where
    T: PartialEq<U> + fmt::Debug,
    U: fmt::Debug,
{
    let is_passing = lhs == rhs;
    check(Expectation {
        is_passing,
        expression: "lhs == rhs".to_owned(),
        expanded: Some(format!("{lhs:?} == {rhs:?}")),
        comment: None,
        source_location: Some(source_location_of(Location::caller())),
    })
}

#[track_caller]
fn check(expectation: Expectation) -> bool {
    let is_passing = expectation.is_passing;
    let Some(context) = TestContext::try_current() else {
        warn_outside_test("expect");
        return is_passing;
    };

    context.post(EventKind::ExpectationChecked(expectation.clone()));
    if !is_passing {
        let source_context = SourceContext::capture(expectation.source_location.clone());
        context.record(
            Issue::new(IssueKind::ExpectationFailed(expectation))
                .with_source_context(source_context),
        );
    }
    is_passing
}

/// Attaches a value to the running test.
#[track_caller]
pub fn attach(attachment: Attachment) {
    match TestContext::try_current() {
        Some(context) => context.post(EventKind::ValueAttached(attachment)),
        None => warn_outside_test("attach"),
    }
}

/// Attaches the file at `path` to the running test.
///
/// If the file cannot be read, an [`IssueKind::AttachmentFailed`] issue is recorded instead.
#[track_caller]
pub fn attach_file(path: impl AsRef<Utf8Path>) {
    let path = path.as_ref();
    match Attachment::from_path(path) {
        Ok(attachment) => attach(attachment),
        Err(error) => {
            record_issue(
                Issue::new(IssueKind::AttachmentFailed(format!("{path}: {error}")))
                    .with_source_context(SourceContext::caller()),
            );
        }
    }
}

/// Runs `fut`, marking every issue recorded within it as known.
///
/// If `fut` returns an error, it is recorded as a known issue rather than failing the test. If no
/// issue is recorded at all, an [`IssueKind::KnownIssueNotRecorded`] issue is recorded.
#[track_caller]
pub fn with_known_issue<F>(
    comment: impl Into<String>,
    fut: F,
) -> impl Future<Output = TestResult> + Send
where
    F: Future<Output = TestResult> + Send,
{
    let comment = comment.into();
    let source_context = SourceContext::caller();
    async move {
        let Some(context) = TestContext::try_current() else {
            warn!("with_known_issue was called outside of a running test");
            return fut.await;
        };

        let scope = Arc::new(KnownIssueScope {
            comment: Some(comment),
            matched: AtomicUsize::new(0),
        });
        let inner = TestContext {
            known_issue: Some(scope.clone()),
            ..context.clone()
        };
        let result = CURRENT.scope(inner.clone(), fut).await;
        if let Err(error) = result {
            inner.record(Issue::error_caught(&error).with_source_context(source_context.clone()));
        }

        if scope.matched.load(Ordering::Acquire) == 0 {
            context.record(
                Issue::new(IssueKind::KnownIssueNotRecorded).with_source_context(source_context),
            );
        }
        Ok(())
    }
}

/// Counts how many times an event occurred within [`confirmation`].
#[derive(Debug, Default)]
pub struct Confirmation {
    count: AtomicUsize,
}

impl Confirmation {
    /// Confirms that the event occurred once.
    pub fn confirm(&self) {
        self.confirm_times(1);
    }

    /// Confirms that the event occurred `count` times.
    pub fn confirm_times(&self, count: usize) {
        self.count.fetch_add(count, Ordering::AcqRel);
    }

    /// Returns the number of confirmations so far.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
}

/// Runs `body` with a fresh [`Confirmation`], recording an
/// [`IssueKind::ConfirmationMiscounted`] issue unless it was confirmed exactly `expected` times.
#[track_caller]
pub fn confirmation<F, Fut>(
    comment: impl Into<String>,
    expected: usize,
    body: F,
) -> impl Future<Output = TestResult> + Send
where
    F: FnOnce(Arc<Confirmation>) -> Fut,
    Fut: Future<Output = TestResult> + Send,
{
    let comment = comment.into();
    let source_context = SourceContext::caller();
    let confirmation = Arc::new(Confirmation::default());
    let fut = body(confirmation.clone());
    async move {
        let result = fut.await;
        let actual = confirmation.count();
        if actual != expected {
            let issue = Issue::new(IssueKind::ConfirmationMiscounted { actual, expected })
                .with_comment(comment)
                .with_source_context(source_context);
            match TestContext::try_current() {
                Some(context) => {
                    context.record(issue);
                }
                None => warn!("confirmation was awaited outside of a running test: {issue}"),
            }
        }
        result
    }
}

/// A handle for recording issues against a test from outside its task.
///
/// Issues recorded after the test or test case has ended are still delivered, flagged as
/// recorded after the test ended.
#[derive(Clone)]
pub struct IssueRecorder {
    context: TestContext,
}

impl IssueRecorder {
    /// Returns a recorder for the running test or test case, if any.
    pub fn current() -> Option<Self> {
        TestContext::try_current().map(|context| Self { context })
    }

    /// Records `issue`, returning false if an issue handler suppressed it.
    pub fn record(&self, issue: Issue) -> bool {
        self.context.record(issue)
    }

    /// Returns the test this recorder records against.
    pub fn test(&self) -> &Test {
        &self.context.test
    }
}

impl fmt::Debug for IssueRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssueRecorder")
            .field("test", &self.context.test.id)
            .finish_non_exhaustive()
    }
}

impl Test {
    /// Returns the running test, if called from within one.
    pub fn current() -> Option<Arc<Test>> {
        CURRENT.try_with(|context| context.test.clone()).ok()
    }
}

impl TestCase {
    /// Returns the running test case, if called from within one.
    ///
    /// Returns `None` while a suite's scope is running.
    pub fn current() -> Option<Arc<TestCase>> {
        CURRENT
            .try_with(|context| context.test_case.clone())
            .ok()
            .flatten()
    }
}
