// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Issues, skips and the errors returned by test bodies.
//!
//! An [`Issue`] is anything noteworthy that happened while a test ran: a failed expectation, an
//! error returned from the body, an exceeded time limit and so on. Issues with
//! [`Severity::Error`] fail the run unless they are known.
//!
//! A [`SkipInfo`] is not an issue: it describes why a test was skipped. It doubles as an error
//! type, so that traits and test bodies can skip a test by returning it through a [`TestError`].

use backtrace_ext::capture_backtrace;
use std::{error, fmt, panic::Location, time::Duration};
use testament_metadata::SourceLocation;

/// The result type returned by test bodies, traits and scopes.
pub type TestResult = Result<(), TestError>;

/// The severity of an [`Issue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// The issue is reported, but does not cause the test to fail.
    Warning,

    /// The issue causes the test to fail, unless it is known.
    Error,
}

/// Where an issue or skip originated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceContext {
    /// A rendered backtrace, if one was captured.
    pub backtrace: Option<String>,

    /// The source location, if known.
    pub source_location: Option<SourceLocation>,
}

impl SourceContext {
    /// Creates a source context for the given location, without a backtrace.
    pub fn at(source_location: Option<SourceLocation>) -> Self {
        Self {
            backtrace: None,
            source_location,
        }
    }

    /// Creates a source context for the caller of the function this is invoked from.
    #[track_caller]
    pub fn caller() -> Self {
        Self::at(Some(source_location_of(Location::caller())))
    }

    /// Creates a source context, capturing a backtrace if `RUST_BACKTRACE` enables them.
    pub fn capture(source_location: Option<SourceLocation>) -> Self {
        Self {
            backtrace: capture_backtrace(false),
            source_location,
        }
    }

    /// Creates a source context, unconditionally capturing the current backtrace.
    pub fn force_capture(source_location: Option<SourceLocation>) -> Self {
        Self {
            backtrace: capture_backtrace(true),
            source_location,
        }
    }
}

mod backtrace_ext {
    use std::backtrace::{Backtrace, BacktraceStatus};

    pub(super) fn capture_backtrace(force: bool) -> Option<String> {
        let backtrace = if force {
            Backtrace::force_capture()
        } else {
            Backtrace::capture()
        };
        match backtrace.status() {
            BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        }
    }
}

/// Converts a [`Location`] obtained through `#[track_caller]` into a [`SourceLocation`].
pub fn source_location_of(location: &Location<'_>) -> SourceLocation {
    SourceLocation::new(location.file(), location.line(), location.column())
}

/// The outcome of checking a single expectation.
///
/// This is the payload of both expectation-checked events and expectation-failed issues.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expectation {
    /// Whether the expectation held.
    pub is_passing: bool,

    /// The source text of the checked expression, or a rendering of it.
    pub expression: String,

    /// An expanded description of the operands, shown at higher verbosity.
    pub expanded: Option<String>,

    /// A comment supplied by the test author.
    pub comment: Option<String>,

    /// Where the expectation was checked.
    pub source_location: Option<SourceLocation>,
}

/// The kind of an [`Issue`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum IssueKind {
    /// An issue recorded explicitly by the test author.
    Unconditional,

    /// An expectation did not hold.
    ExpectationFailed(Expectation),

    /// A confirmation was confirmed a different number of times than expected.
    ConfirmationMiscounted {
        /// How many times the confirmation was confirmed.
        actual: usize,
        /// How many times it was expected to be confirmed.
        expected: usize,
    },

    /// A test body, trait or scope returned an error or panicked.
    ErrorCaught(String),

    /// A test case ran for longer than its time limit.
    TimeLimitExceeded {
        /// The time limit that was exceeded.
        limit: Duration,
    },

    /// A known issue was expected, but none was recorded.
    KnownIssueNotRecorded,

    /// A testament API was used incorrectly.
    ApiMisused,

    /// An attachment could not be created.
    AttachmentFailed(String),

    /// An issue originating in testament itself rather than in the test.
    System,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::Unconditional => write!(f, "Issue recorded"),
            IssueKind::ExpectationFailed(expectation) => {
                write!(f, "Expectation failed: {}", expectation.expression)
            }
            IssueKind::ConfirmationMiscounted { actual, expected } => write!(
                f,
                "Confirmation was confirmed {actual} time{}, but expected to be confirmed \
                 {expected} time{}",
                if *actual == 1 { "" } else { "s" },
                if *expected == 1 { "" } else { "s" },
            ),
            IssueKind::ErrorCaught(description) => write!(f, "Caught error: {description}"),
            IssueKind::TimeLimitExceeded { limit } => write!(
                f,
                "Time limit was exceeded: {}",
                humantime_serde::re::humantime::format_duration(*limit)
            ),
            IssueKind::KnownIssueNotRecorded => write!(f, "Known issue was not recorded"),
            IssueKind::ApiMisused => write!(f, "An API was misused"),
            IssueKind::AttachmentFailed(description) => {
                write!(f, "Could not create attachment: {description}")
            }
            IssueKind::System => write!(f, "A system failure occurred"),
        }
    }
}

/// A problem recorded while a test ran.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Issue {
    /// What happened.
    pub kind: IssueKind,

    /// How serious it is.
    pub severity: Severity,

    /// Whether the issue was expected by the test author.
    pub is_known: bool,

    /// Comments attached to the issue, in order.
    pub comments: Vec<String>,

    /// Where the issue originated.
    pub source_context: SourceContext,
}

impl Issue {
    /// Creates a new, unknown issue with [`Severity::Error`].
    pub fn new(kind: IssueKind) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            is_known: false,
            comments: Vec::new(),
            source_context: SourceContext::default(),
        }
    }

    /// Creates an issue describing an error returned by a test body, trait or scope.
    pub fn error_caught(error: &TestError) -> Self {
        Self::new(IssueKind::ErrorCaught(error.to_string())).with_source_context(
            SourceContext {
                backtrace: error.backtrace().map(str::to_owned),
                source_location: None,
            },
        )
    }

    /// Sets the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Appends a comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comments.push(comment.into());
        self
    }

    /// Sets the source context.
    pub fn with_source_context(mut self, source_context: SourceContext) -> Self {
        self.source_context = source_context;
        self
    }

    /// Marks the issue as known.
    pub fn known(mut self) -> Self {
        self.is_known = true;
        self
    }

    /// Returns true if this issue causes its test to fail.
    ///
    /// Known issues and warnings never fail a test.
    pub fn is_failure(&self) -> bool {
        !self.is_known && self.severity == Severity::Error
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for comment in &self.comments {
            write!(f, ": {comment}")?;
        }
        Ok(())
    }
}

/// Why a test was skipped or cancelled.
///
/// Return this from a trait's `prepare` method or from a test body (converted into a
/// [`TestError`]) to skip the test.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SkipInfo {
    /// An optional comment explaining the skip.
    pub comment: Option<String>,

    /// Where the skip originated.
    pub source_context: SourceContext,
}

impl SkipInfo {
    /// Creates a new `SkipInfo` with the given comment, attributed to the caller.
    #[track_caller]
    pub fn new(comment: impl Into<String>) -> Self {
        Self {
            comment: Some(comment.into()),
            source_context: SourceContext::caller(),
        }
    }

    /// Creates a new `SkipInfo` without a comment.
    pub fn without_comment(source_context: SourceContext) -> Self {
        Self {
            comment: None,
            source_context,
        }
    }
}

impl fmt::Display for SkipInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.comment {
            Some(comment) => write!(f, "skipped: {comment}"),
            None => write!(f, "skipped"),
        }
    }
}

impl error::Error for SkipInfo {}

/// Returned from a test body to indicate that the test or test case was cancelled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CancellationError {
    /// An optional comment explaining the cancellation.
    pub comment: Option<String>,
}

impl CancellationError {
    /// Creates a new cancellation error with a comment.
    pub fn new(comment: impl Into<String>) -> Self {
        Self {
            comment: Some(comment.into()),
        }
    }

    pub(crate) fn into_skip_info(self) -> SkipInfo {
        SkipInfo {
            comment: self.comment,
            source_context: SourceContext::default(),
        }
    }
}

impl fmt::Display for CancellationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.comment {
            Some(comment) => write!(f, "cancelled: {comment}"),
            None => write!(f, "cancelled"),
        }
    }
}

impl error::Error for CancellationError {}

/// An opaque error returned by a test body, trait or scope.
///
/// Any `std::error::Error` converts into a `TestError` through `?`. Two errors have special
/// meaning to the runner: [`SkipInfo`] skips the test, and [`CancellationError`] marks it
/// cancelled. Anything else is recorded as an [`IssueKind::ErrorCaught`] issue.
pub struct TestError {
    inner: Box<dyn error::Error + Send + Sync + 'static>,
    backtrace: Option<String>,
}

impl TestError {
    /// Creates an error from a plain message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::from(MessageError(message.to_string()))
    }

    /// Creates an error from a panic payload caught while running a test.
    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "(non-string panic payload)".to_owned()
        };
        Self::msg(format_args!("test panicked: {message}"))
    }

    /// Returns the inner error if it is of type `E`.
    pub fn downcast_ref<E: error::Error + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// Returns the skip information if this error represents a skip.
    pub fn as_skip(&self) -> Option<&SkipInfo> {
        self.downcast_ref::<SkipInfo>()
    }

    /// Returns the cancellation if this error represents one.
    pub fn as_cancellation(&self) -> Option<&CancellationError> {
        self.downcast_ref::<CancellationError>()
    }

    /// Converts this error into skip information if it represents a skip or a cancellation.
    pub fn to_skip_info(&self) -> Option<SkipInfo> {
        self.as_skip().cloned().or_else(|| {
            self.as_cancellation()
                .cloned()
                .map(CancellationError::into_skip_info)
        })
    }

    /// Returns the backtrace captured when this error was created, if any.
    pub fn backtrace(&self) -> Option<&str> {
        self.backtrace.as_deref()
    }
}

impl<E> From<E> for TestError
where
    E: error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self {
            inner: Box::new(error),
            backtrace: capture_backtrace(false),
        }
    }
}

impl fmt::Debug for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)?;
        let mut source = self.inner.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }
        Ok(())
    }
}

#[derive(Debug)]
struct MessageError(String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl error::Error for MessageError {}
