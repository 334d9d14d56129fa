// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{EventPoster, RunContext, RunObserver, RunStats, Serializer};
use crate::{
    config::Configuration,
    current::TestContext,
    errors::{PlanError, RunnerBuildError},
    graph::NodeIndex,
    issue::{Issue, IssueKind, SkipInfo, SourceContext, TestError, TestResult},
    plan::{Action, Plan},
    reporter::events::EventKind,
    test::{Test, TestCase, TestCases},
    traits::{ScopeNext, TestScoping},
};
use futures::{FutureExt, future::BoxFuture};
use std::{cmp::Ordering, panic::AssertUnwindSafe, sync::Arc};
use testament_metadata::SourceLocation;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, instrument, warn};

/// Runs a [`Plan`].
///
/// A runner posts every event of the run to the event handler of its [`Configuration`]. Runs
/// are independent of each other: several runners with different configurations may run
/// concurrently.
#[derive(Debug)]
pub struct Runner {
    plan: Arc<Plan>,
    configuration: Arc<Configuration>,
    cancellation: CancellationToken,
}

impl Runner {
    /// Plans `tests` under `configuration` and creates a runner for the plan.
    pub fn new(
        tests: impl IntoIterator<Item = Test>,
        configuration: Configuration,
    ) -> Result<Self, PlanError> {
        let plan = Plan::new(tests, &configuration)?;
        Ok(Self::with_plan(plan, configuration))
    }

    /// Creates a runner for an existing plan.
    pub fn with_plan(plan: Plan, configuration: Configuration) -> Self {
        Self {
            plan: Arc::new(plan),
            configuration: Arc::new(configuration),
            cancellation: CancellationToken::new(),
        }
    }

    /// Returns the plan this runner runs.
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Returns the configuration of this runner.
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Returns a token that cancels the run when triggered.
    ///
    /// Cancellation is cooperative: steps and test cases that have not started yet are not
    /// started, while running test cases are left to finish.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Runs the plan, repeating it as the repetition policy dictates.
    #[instrument(level = "debug", skip_all, fields(steps = self.plan.step_count()))]
    pub async fn run(&self) -> RunStats {
        let observer = Arc::new(RunObserver::new(self.configuration.event_handler.0.clone()));
        let poster = EventPoster::with_handler(self.configuration.clone(), observer.clone());

        for step in self.plan.iter_steps() {
            poster.post(EventKind::TestDiscovered, Some(&step.test), None);
        }
        poster.post(EventKind::RunStarted, None, None);

        let serializer = self
            .configuration
            .maximum_parallelization_width
            .map(|width| Arc::new(Serializer::new(width)));
        let policy = self.configuration.repetition_policy;

        for index in 1..=policy.maximum_iteration_count.get() {
            if self.cancellation.is_cancelled() {
                debug!(index, "run cancelled, not starting iteration");
                break;
            }

            observer.take_issue_recorded();
            let ctx = RunContext {
                plan: self.plan.clone(),
                poster: poster.for_iteration(index),
                cancellation: self.cancellation.clone(),
                serializer: serializer.clone(),
            };
            ctx.poster
                .post(EventKind::IterationStarted { index }, None, None);
            run_node(
                ctx.clone(),
                NodeIndex::ROOT,
                self.configuration.is_parallelization_enabled,
            )
            .await;
            ctx.poster.post(EventKind::IterationEnded { index }, None, None);

            let issue_recorded = observer.take_issue_recorded();
            if !policy.continuation.should_continue(issue_recorded) {
                debug!(index, issue_recorded, "stopping repetition");
                break;
            }
        }

        poster.post(EventKind::RunEnded, None, None);
        observer.stats()
    }

    /// Runs the plan on a dedicated multi-threaded runtime, blocking until it finishes.
    pub fn run_blocking(&self) -> Result<RunStats, RunnerBuildError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("testament-runner-worker")
            .build()
            .map_err(RunnerBuildError::new)?;
        Ok(runtime.block_on(self.run()))
    }
}

/// Posts the end of a plan step when dropped, so that it is posted even if the step is
/// cancelled partway through.
struct PlanStepGuard {
    poster: EventPoster,
    test: Arc<Test>,
}

impl Drop for PlanStepGuard {
    fn drop(&mut self) {
        self.poster
            .post(EventKind::PlanStepEnded, Some(&self.test), None);
    }
}

/// Runs the step at `index`, if any, and then everything nested within it.
///
/// `parallel` is whether the children of a node without a step may run in parallel.
fn run_node(ctx: RunContext, index: NodeIndex, parallel: bool) -> BoxFuture<'static, ()> {
    async move {
        if ctx.is_cancelled() {
            return;
        }

        let Some(step) = ctx.plan.steps().node_at(index).value().cloned() else {
            run_children(ctx, index, parallel).await;
            return;
        };

        let test = step.test;
        ctx.poster
            .post(EventKind::PlanStepStarted, Some(&test), None);
        let _guard = PlanStepGuard {
            poster: ctx.poster.clone(),
            test: test.clone(),
        };

        match step.action {
            Action::Run(options) => {
                run_test(&ctx, index, test, options.is_parallelization_enabled).await;
            }
            Action::Skip(skip_info) => {
                debug!(id = %test.id, "skipping test");
                ctx.poster
                    .post(EventKind::TestSkipped(skip_info), Some(&test), None);
                run_children(ctx.clone(), index, parallel).await;
            }
            Action::RecordIssue(issue) => {
                TestContext::new(test.clone(), None, ctx.poster.clone()).record(issue);
                run_children(ctx.clone(), index, parallel).await;
            }
        }
    }
    .boxed()
}

async fn run_test(ctx: &RunContext, index: NodeIndex, test: Arc<Test>, parallel: bool) {
    ctx.poster.post(EventKind::TestStarted, Some(&test), None);
    let context = TestContext::new(test.clone(), None, ctx.poster.clone());

    let result = match &test.test_cases {
        None => {
            // Suites run their children within their own scopes.
            let children_ctx = ctx.clone();
            let innermost: ScopeNext = Box::new(move || {
                async move {
                    run_children(children_ctx, index, parallel).await;
                    Ok(())
                }
                .boxed()
            });
            context
                .clone()
                .scope(catch_panics(scoped(test.clone(), None, innermost)))
                .await
        }
        Some(test_cases) => {
            run_test_cases(ctx, &test, test_cases, parallel).await;
            run_children(ctx.clone(), index, parallel).await;
            Ok(())
        }
    };

    if let Err(error) = result {
        match error.to_skip_info() {
            Some(skip_info) => {
                ctx.poster
                    .post(EventKind::TestCancelled(skip_info), Some(&test), None);
            }
            None => {
                context.record(error_issue(&error, &test));
            }
        }
    }

    context.end();
    ctx.poster.post(EventKind::TestEnded, Some(&test), None);
}

async fn run_test_cases(
    ctx: &RunContext,
    test: &Arc<Test>,
    test_cases: &TestCases,
    parallel: bool,
) {
    let cases = match test_cases.evaluate() {
        Ok(cases) => cases,
        Err(error) => {
            TestContext::new(test.clone(), None, ctx.poster.clone())
                .record(error_issue(&error, test));
            return;
        }
    };
    let cases = cases
        .into_iter()
        .filter(|case| ctx.configuration().should_run_test_case(case, test));

    if parallel {
        let mut join_set = JoinSet::new();
        for case in cases {
            let span = info_span!("test_case", id = %test.id, case = %case.id);
            join_set.spawn(run_test_case(ctx.clone(), test.clone(), case).instrument(span));
        }
        join_all(join_set).await;
    } else {
        for case in cases {
            run_test_case(ctx.clone(), test.clone(), case).await;
        }
    }
}

async fn run_test_case(ctx: RunContext, test: Arc<Test>, case: Arc<TestCase>) {
    if ctx.is_cancelled() {
        return;
    }
    let _permit = match &ctx.serializer {
        Some(serializer) => serializer.acquire().await,
        None => None,
    };

    ctx.poster
        .post(EventKind::TestCaseStarted, Some(&test), Some(&case));
    let context = TestContext::new(test.clone(), Some(case.clone()), ctx.poster.clone());

    let body = case.body.clone();
    let innermost: ScopeNext = Box::new(move || body());
    let fut = context
        .clone()
        .scope(catch_panics(scoped(test.clone(), Some(case.clone()), innermost)));

    let result = match ctx.configuration().time_limits.effective_limit(&test) {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                debug!(id = %test.id, case = %case.id, ?limit, "time limit exceeded");
                context.record(
                    Issue::new(IssueKind::TimeLimitExceeded { limit }).with_source_context(
                        SourceContext::force_capture(test.source_location.clone()),
                    ),
                );
                Ok(())
            }
        },
        None => fut.await,
    };

    if let Err(error) = result {
        match error.to_skip_info() {
            Some(skip_info) => post_cancelled(&ctx, &test, &case, skip_info),
            None => {
                context.record(error_issue(&error, &test));
            }
        }
    }

    context.end();
    ctx.poster
        .post(EventKind::TestCaseEnded, Some(&test), Some(&case));
}

fn post_cancelled(ctx: &RunContext, test: &Test, case: &TestCase, skip_info: SkipInfo) {
    // A non-parameterized test only has one case, so cancelling it cancels the test.
    let kind = if test.is_parameterized() {
        EventKind::TestCaseCancelled(skip_info)
    } else {
        EventKind::TestCancelled(skip_info)
    };
    ctx.poster.post(kind, Some(test), Some(case));
}

/// Runs `innermost` within the scopes provided by the traits of `test`.
///
/// The scope of the first trait is the outermost. Scopes are requested when the returned future
/// is first polled, so that they run within the test's context.
fn scoped(
    test: Arc<Test>,
    test_case: Option<Arc<TestCase>>,
    innermost: ScopeNext,
) -> BoxFuture<'static, TestResult> {
    async move {
        let scopes: Vec<Arc<dyn TestScoping>> = test
            .traits
            .iter()
            .filter_map(|t| t.scope_provider(&test, test_case.as_deref()))
            .collect();

        let next = scopes.into_iter().rev().fold(innermost, |next, scope| {
            let test = test.clone();
            let test_case = test_case.clone();
            let wrapped: ScopeNext = Box::new(move || scope.provide_scope(test, test_case, next));
            wrapped
        });
        next().await
    }
    .boxed()
}

async fn catch_panics(fut: BoxFuture<'static, TestResult>) -> TestResult {
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(TestError::from_panic(&*payload)))
}

fn error_issue(error: &TestError, test: &Test) -> Issue {
    let mut issue = Issue::error_caught(error);
    if issue.source_context.source_location.is_none() {
        issue.source_context.source_location = test.source_location.clone();
    }
    issue
}

async fn run_children(ctx: RunContext, index: NodeIndex, parallel: bool) {
    let node = ctx.plan.steps().node_at(index);
    if parallel {
        let mut join_set = JoinSet::new();
        for child in node.children() {
            let span = info_span!("step", path = %child.key_path().join("."));
            join_set.spawn(run_node(ctx.clone(), child.index(), parallel).instrument(span));
        }
        join_all(join_set).await;
    } else {
        let mut children: Vec<_> = node
            .children()
            .map(|child| {
                let location = child
                    .pre_order()
                    .filter_map(|node| node.value()?.test.source_location.clone())
                    .min();
                (location, child.index())
            })
            .collect();
        children.sort_by(|(a, _), (b, _)| compare_locations(a.as_ref(), b.as_ref()));
        for (_, child) in children {
            run_node(ctx.clone(), child, parallel).await;
        }
    }
}

/// Orders source locations ascending, with missing locations last.
fn compare_locations(a: Option<&SourceLocation>, b: Option<&SourceLocation>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

async fn join_all(mut join_set: JoinSet<()>) {
    while let Some(result) = join_set.join_next().await {
        if let Err(error) = result {
            // Panics in test bodies are caught before they reach the task boundary, so this
            // only happens if an event handler panicked.
            warn!("test task failed: {error}");
        }
    }
}
