// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turning discovered tests into an executable plan.
//!
//! Planning happens in several passes over a [`Graph`] of tests keyed by ID:
//!
//! 1. The configured [`TestFilter`](crate::test_filter::TestFilter) selects the tests to run.
//! 2. Suites that were never declared, but have tests nested within them, are synthesized.
//! 3. Recursive traits of suites are propagated to everything within them.
//! 4. Each test's traits are prepared to decide its [`Action`], and the cases of parameterized
//!    tests are generated.
//! 5. Skips and recorded issues of suites are applied to everything within them.
//!
//! The result is a [`Plan`]: a graph of [`Step`]s, each pairing a test with its action.

use crate::{
    config::Configuration,
    errors::PlanError,
    graph::{Graph, NodeIndex, NodeRef},
    issue::{Issue, SkipInfo, SourceContext, TestError},
    test::{Test, TestCases, TestGraph},
    traits::TestTrait,
};
use smol_str::SmolStr;
use std::{collections::HashMap, sync::Arc};
use testament_metadata::{SourceLocation, TestId};
use tracing::{debug, trace};

/// What to do with a test.
#[derive(Clone, Debug)]
pub enum Action {
    /// Run the test.
    Run(RunOptions),

    /// Skip the test, and everything within it.
    Skip(SkipInfo),

    /// Record an issue instead of running the test, and everything within it.
    RecordIssue(Issue),
}

impl Action {
    /// Returns true if this action applies to everything nested within the test.
    ///
    /// Every action other than [`Action::Run`] is recursive.
    pub fn is_recursive(&self) -> bool {
        !matches!(self, Action::Run(_))
    }
}

/// Options for running a test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunOptions {
    /// Whether the test cases and children of this test may run in parallel.
    pub is_parallelization_enabled: bool,
}

/// A test paired with the action to take for it.
#[derive(Clone, Debug)]
pub struct Step {
    /// The test.
    pub test: Arc<Test>,

    /// What to do with it.
    pub action: Action,
}

/// An executable plan.
///
/// For more, see the [module-level documentation](self).
#[derive(Clone, Debug)]
pub struct Plan {
    steps: Graph<SmolStr, Step>,
}

impl Plan {
    /// Plans the execution of `tests` under `configuration`.
    ///
    /// Errors from traits are not planning errors: they turn into steps that record an issue.
    /// Planning only fails if the test filter cannot be evaluated.
    pub fn new(
        tests: impl IntoIterator<Item = Test>,
        configuration: &Configuration,
    ) -> Result<Self, PlanError> {
        let mut test_graph = TestGraph::new();
        for test in tests {
            let key_path = test.id.key_path();
            if test_graph.insert(&key_path, Arc::new(test)).is_some() {
                debug!(key_path = ?key_path, "duplicate test ID, keeping the last test");
            }
        }

        let test_graph = configuration.test_filter.apply(&test_graph)?;
        let test_graph = synthesize_suites(&test_graph);
        let test_graph = propagate_recursive_traits(&test_graph);

        let steps = test_graph.map_values(|_, test| {
            let test = test?;
            let prepared = determine_action(test, configuration);
            Some(Step {
                test: prepared.test.unwrap_or_else(|| test.clone()),
                action: prepared.action,
            })
        });
        let steps = apply_recursive_actions(&steps);

        debug!(steps = steps.value_count(), "planned test run");
        Ok(Self { steps })
    }

    /// Returns the graph of steps.
    pub fn steps(&self) -> &Graph<SmolStr, Step> {
        &self.steps
    }

    /// Returns the step for the test with `id`, if it is part of the plan.
    pub fn step(&self, id: &TestId) -> Option<&Step> {
        self.steps.get(&id.key_path())
    }

    /// Iterates over all steps in pre-order.
    pub fn iter_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter_map(|node| node.value())
    }

    /// Returns the number of steps.
    pub fn step_count(&self) -> usize {
        self.steps.value_count()
    }

    /// Returns true if the plan contains no steps.
    pub fn is_empty(&self) -> bool {
        self.step_count() == 0
    }
}

/// Adds synthesized suites for key paths that have tests nested within them but no declaration.
///
/// Module-level nodes and the name nodes directly above test functions are not suites.
fn synthesize_suites(graph: &TestGraph) -> TestGraph {
    graph.map_values(|key_path, test| {
        if let Some(test) = test {
            return Some(test.clone());
        }
        if key_path.len() < 2 {
            return None;
        }
        let node = graph.node(key_path)?;
        if node.is_leaf() {
            return None;
        }
        let is_function_name = node
            .children()
            .any(|child| child.value().is_some_and(|test| !test.is_suite));
        if is_function_name {
            return None;
        }

        let id = TestId::from_key_path(key_path)?;
        trace!(%id, "synthesizing suite");
        Some(Arc::new(Test::synthesized_suite(id, min_source_location(node))))
    })
}

/// Returns the smallest source location of a test at or below `node`.
fn min_source_location(node: NodeRef<'_, SmolStr, Arc<Test>>) -> Option<SourceLocation> {
    node.pre_order()
        .filter_map(|node| node.value()?.source_location.clone())
        .min()
}

/// Prepends the recursive traits of every suite to the traits of everything nested within it.
fn propagate_recursive_traits(graph: &TestGraph) -> TestGraph {
    // The recursive traits in effect below each node, inherited ones first. Parents are always
    // mapped before their children.
    let mut inherited: HashMap<NodeIndex, Vec<Arc<dyn TestTrait>>> = HashMap::new();

    graph.map_values(|key_path, test| {
        let node = graph.node(key_path)?;
        let mut traits = node
            .parent()
            .and_then(|parent| inherited.get(&parent.index()))
            .cloned()
            .unwrap_or_default();

        let Some(test) = test else {
            inherited.insert(node.index(), traits);
            return None;
        };

        let inherited_count = traits.len();
        traits.extend(test.traits.iter().cloned());
        let recursive = traits
            .iter()
            .enumerate()
            .filter(|(i, t)| *i < inherited_count || t.is_recursive())
            .map(|(_, t)| t.clone())
            .collect();
        inherited.insert(node.index(), recursive);

        if inherited_count == 0 {
            Some(test.clone())
        } else {
            Some(Arc::new(Test {
                traits,
                ..(**test).clone()
            }))
        }
    })
}

struct PreparedStep {
    action: Action,
    // The test with its cases evaluated, if that changed anything.
    test: Option<Arc<Test>>,
}

/// Prepares the traits of `test` and evaluates its test cases to decide its action.
fn determine_action(test: &Arc<Test>, configuration: &Configuration) -> PreparedStep {
    let mut first_error: Option<TestError> = None;
    for test_trait in &test.traits {
        if let Err(error) = test_trait.prepare(test) {
            if let Some(skip) = error.as_skip() {
                return PreparedStep {
                    action: Action::Skip(skip.clone()),
                    test: None,
                };
            }
            first_error.get_or_insert(error);
        }
    }
    if let Some(error) = first_error {
        return PreparedStep {
            action: record_issue_for(&error, test),
            test: None,
        };
    }

    let run = Action::Run(RunOptions {
        is_parallelization_enabled: configuration.is_parallelization_enabled
            && !test.traits.iter().any(|t| t.is_serialized()),
    });

    let Some(test_cases @ TestCases::Generator(_)) = &test.test_cases else {
        return PreparedStep {
            action: run,
            test: None,
        };
    };
    match test_cases.evaluate() {
        Ok(cases) if cases.is_empty() => PreparedStep {
            action: Action::Skip(SkipInfo {
                comment: Some("No test cases found.".to_owned()),
                source_context: SourceContext::at(test.source_location.clone()),
            }),
            test: None,
        },
        Ok(cases) => PreparedStep {
            action: run,
            test: Some(Arc::new(Test {
                test_cases: Some(TestCases::Evaluated(cases)),
                ..(**test).clone()
            })),
        },
        Err(error) => PreparedStep {
            action: match error.as_skip() {
                Some(skip) => Action::Skip(skip.clone()),
                None => record_issue_for(&error, test),
            },
            test: None,
        },
    }
}

fn record_issue_for(error: &TestError, test: &Test) -> Action {
    let mut issue = Issue::error_caught(error);
    if issue.source_context.source_location.is_none() {
        issue.source_context.source_location = test.source_location.clone();
    }
    Action::RecordIssue(issue)
}

/// Replaces the action of every step nested within a skipped suite, or a suite that records an
/// issue, with that suite's action. The nearest such ancestor wins.
fn apply_recursive_actions(steps: &Graph<SmolStr, Step>) -> Graph<SmolStr, Step> {
    let mut overriding: HashMap<NodeIndex, Action> = HashMap::new();

    steps.map_values(|key_path, step| {
        let node = steps.node(key_path)?;
        let from_ancestor = node
            .parent()
            .and_then(|parent| overriding.get(&parent.index()))
            .cloned();

        let Some(step) = step else {
            if let Some(action) = from_ancestor {
                overriding.insert(node.index(), action);
            }
            return None;
        };
        let action = from_ancestor.unwrap_or_else(|| step.action.clone());
        if action.is_recursive() {
            overriding.insert(node.index(), action.clone());
        }
        Some(Step {
            test: step.test.clone(),
            action,
        })
    })
}
