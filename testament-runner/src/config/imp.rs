// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{RepetitionPolicy, TimeLimits};
use crate::{
    reporter::events::{EventHandler, NoopEventHandler},
    test::{Test, TestCase},
    test_filter::TestFilter,
};
use debug_ignore::DebugIgnore;
use std::{num::NonZeroUsize, sync::Arc};

/// A predicate deciding whether a test case of a test should run.
pub type TestCaseFilter = Arc<dyn Fn(&TestCase, &Test) -> bool + Send + Sync>;

/// Settings for a single test run.
///
/// For more, see the [module-level documentation](super).
#[derive(Clone, Debug)]
pub struct Configuration {
    /// Whether tests and test cases may run in parallel.
    pub is_parallelization_enabled: bool,

    /// The maximum number of test cases running at once, if limited.
    pub maximum_parallelization_width: Option<NonZeroUsize>,

    /// How many times to run the plan.
    pub repetition_policy: RepetitionPolicy,

    /// Time limit settings.
    pub time_limits: TimeLimits,

    /// The handler that receives every event posted during the run.
    pub event_handler: DebugIgnore<Arc<dyn EventHandler>>,

    /// Whether expectation-checked events are delivered. They are frequent, so they are off by
    /// default.
    pub deliver_expectation_checked_events: bool,

    /// Which tests to run.
    pub test_filter: TestFilter,

    /// Which test cases of the selected tests to run.
    pub test_case_filter: Option<DebugIgnore<TestCaseFilter>>,

    /// How much output recorders produce. Zero is standard, negative values are quieter and
    /// positive values more verbose.
    pub verbosity: i32,
}

impl Configuration {
    /// Sets whether tests may run in parallel.
    pub fn with_parallelization(mut self, enabled: bool) -> Self {
        self.is_parallelization_enabled = enabled;
        self
    }

    /// Limits the number of test cases running at once.
    pub fn with_maximum_parallelization_width(mut self, width: NonZeroUsize) -> Self {
        self.maximum_parallelization_width = Some(width);
        self
    }

    /// Sets the repetition policy.
    pub fn with_repetition_policy(mut self, policy: RepetitionPolicy) -> Self {
        self.repetition_policy = policy;
        self
    }

    /// Sets the time limit settings.
    pub fn with_time_limits(mut self, time_limits: TimeLimits) -> Self {
        self.time_limits = time_limits;
        self
    }

    /// Sets the event handler.
    pub fn with_event_handler(mut self, handler: impl EventHandler + 'static) -> Self {
        self.event_handler = DebugIgnore(Arc::new(handler));
        self
    }

    /// Sets the event handler from a shared handler.
    pub fn with_shared_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = DebugIgnore(handler);
        self
    }

    /// Sets whether expectation-checked events are delivered.
    pub fn with_expectation_checked_events(mut self, deliver: bool) -> Self {
        self.deliver_expectation_checked_events = deliver;
        self
    }

    /// Sets the test filter.
    pub fn with_test_filter(mut self, filter: TestFilter) -> Self {
        self.test_filter = filter;
        self
    }

    /// Sets the test case filter.
    pub fn with_test_case_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&TestCase, &Test) -> bool + Send + Sync + 'static,
    {
        self.test_case_filter = Some(DebugIgnore(Arc::new(filter)));
        self
    }

    /// Sets the verbosity.
    pub fn with_verbosity(mut self, verbosity: i32) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Returns true if `test_case` of `test` passes the test case filter.
    pub fn should_run_test_case(&self, test_case: &TestCase, test: &Test) -> bool {
        self.test_case_filter
            .as_ref()
            .is_none_or(|filter| filter(test_case, test))
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            is_parallelization_enabled: true,
            maximum_parallelization_width: None,
            repetition_policy: RepetitionPolicy::default(),
            time_limits: TimeLimits::default(),
            event_handler: DebugIgnore(Arc::new(NoopEventHandler)),
            deliver_expectation_checked_events: false,
            test_filter: TestFilter::unfiltered(),
            test_case_filter: None,
            verbosity: 0,
        }
    }
}
