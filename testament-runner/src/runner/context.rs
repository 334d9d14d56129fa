// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{RunStats, Serializer};
use crate::{
    config::Configuration,
    plan::Plan,
    reporter::events::{Event, EventContext, EventHandler, EventKind},
    test::{Test, TestCase},
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Posts events to the handler of a run, along with their context.
#[derive(Clone)]
pub(crate) struct EventPoster {
    configuration: Arc<Configuration>,
    handler: Arc<dyn EventHandler>,
    iteration: Option<usize>,
}

impl EventPoster {
    /// Creates a poster delivering to the configured event handler.
    #[cfg(test)]
    pub(crate) fn new(configuration: Arc<Configuration>) -> Self {
        let handler = configuration.event_handler.0.clone();
        Self::with_handler(configuration, handler)
    }

    pub(crate) fn with_handler(
        configuration: Arc<Configuration>,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            configuration,
            handler,
            iteration: None,
        }
    }

    /// Returns a poster that attributes events to the given 1-based iteration.
    pub(crate) fn for_iteration(&self, iteration: usize) -> Self {
        Self {
            iteration: Some(iteration),
            ..self.clone()
        }
    }

    pub(crate) fn configuration(&self) -> &Arc<Configuration> {
        &self.configuration
    }

    pub(crate) fn post(&self, kind: EventKind, test: Option<&Test>, test_case: Option<&TestCase>) {
        if matches!(kind, EventKind::ExpectationChecked(_))
            && !self.configuration.deliver_expectation_checked_events
        {
            return;
        }

        let event = Event::new(kind);
        trace!(
            event = event.kind.name(),
            test = test.map(|test| test.id.to_string()).as_deref(),
            iteration = self.iteration,
            "posting event"
        );
        let context = EventContext {
            test,
            test_case,
            iteration: self.iteration,
            configuration: &self.configuration,
        };
        self.handler.handle_event(&event, &context);
    }
}

/// Observes every event of a run to track statistics, before forwarding it to the configured
/// handler.
pub(crate) struct RunObserver {
    inner: Arc<dyn EventHandler>,
    stats: Mutex<RunStats>,
    issue_recorded: AtomicBool,
}

impl RunObserver {
    pub(crate) fn new(inner: Arc<dyn EventHandler>) -> Self {
        Self {
            inner,
            stats: Mutex::new(RunStats::default()),
            issue_recorded: AtomicBool::new(false),
        }
    }

    /// Clears the flag tracking whether a failing issue was recorded, returning its old value.
    pub(crate) fn take_issue_recorded(&self) -> bool {
        self.issue_recorded.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn stats(&self) -> RunStats {
        *self.lock_stats()
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, RunStats> {
        // The stats are plain counters, so they remain consistent even if a handler panicked.
        self.stats
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn observe(&self, event: &Event, context: &EventContext<'_>) {
        let mut stats = self.lock_stats();
        match &event.kind {
            EventKind::TestDiscovered => stats.steps += 1,
            EventKind::TestStarted => match context.test {
                Some(test) if test.is_suite => stats.suites_started += 1,
                _ => stats.tests_started += 1,
            },
            EventKind::TestSkipped(_) => stats.tests_skipped += 1,
            EventKind::TestCancelled(_) | EventKind::TestCaseCancelled(_) => stats.cancelled += 1,
            EventKind::IssueRecorded { issue, .. } => {
                stats.issues += 1;
                if issue.is_known {
                    stats.known_issues += 1;
                }
                if issue.is_failure() {
                    stats.failing_issues += 1;
                    self.issue_recorded.store(true, Ordering::Release);
                }
            }
            EventKind::IterationEnded { index } => stats.iterations = *index,
            _ => {}
        }
    }
}

impl EventHandler for RunObserver {
    fn handle_event(&self, event: &Event, context: &EventContext<'_>) {
        self.observe(event, context);
        self.inner.handle_event(event, context);
    }
}

/// State shared by every task of a run.
#[derive(Clone)]
pub(crate) struct RunContext {
    pub(crate) plan: Arc<Plan>,
    pub(crate) poster: EventPoster,
    pub(crate) cancellation: CancellationToken,
    pub(crate) serializer: Option<Arc<Serializer>>,
}

impl RunContext {
    pub(crate) fn configuration(&self) -> &Configuration {
        self.poster.configuration()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}
