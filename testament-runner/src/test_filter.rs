// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Selecting the tests to run.
//!
//! The main structure in this module is [`TestFilter`]. Filters select tests by ID, by tag, by
//! regular expression or by an arbitrary predicate, and can be combined with
//! [`TestFilter::combining`].
//!
//! Applying a filter to a [`TestGraph`] keeps every selected test together with its ancestors
//! (so that the suites containing it still run) and its descendants (so that selecting a suite
//! selects everything in it). Tags are inherited: a test carries the tags of every suite it is
//! nested in.

use crate::{
    errors::{TestFilterBuildError, TestFilterError},
    graph::Graph,
    issue::TestError,
    test::{Test, TestGraph},
};
use debug_ignore::DebugIgnore;
use regex::Regex;
use smol_str::SmolStr;
use std::{
    collections::{BTreeSet, HashSet},
    sync::Arc,
};
use testament_metadata::{Tag, TestId};
use tracing::debug;

/// Whether the tests matched by a filter are included or excluded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Membership {
    /// Only matching tests are kept.
    Including,

    /// Matching tests are removed.
    Excluding,
}

/// How two filters are combined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CombinationOperator {
    /// A test is kept if both filters keep it.
    And,

    /// A test is kept if either filter keeps it.
    Or,
}

type FilterPredicate = Arc<dyn Fn(&Test) -> Result<bool, TestError> + Send + Sync>;

#[derive(Clone, Debug)]
enum FilterKind {
    Unfiltered,
    TestIds {
        key_paths: HashSet<Vec<SmolStr>>,
        membership: Membership,
    },
    Tags {
        tags: BTreeSet<Tag>,
        any_of: bool,
        membership: Membership,
    },
    Patterns {
        patterns: Vec<Regex>,
        membership: Membership,
    },
    Predicate {
        predicate: DebugIgnore<FilterPredicate>,
        membership: Membership,
    },
    Combination {
        lhs: Box<FilterKind>,
        rhs: Box<FilterKind>,
        operator: CombinationOperator,
    },
}

/// A filter over the tests of a run.
///
/// For more, see the [module-level documentation](self).
#[derive(Clone, Debug)]
pub struct TestFilter {
    kind: FilterKind,
    include_hidden_tests: bool,
}

impl TestFilter {
    /// A filter that keeps every (non-hidden) test.
    pub fn unfiltered() -> Self {
        Self::new(FilterKind::Unfiltered)
    }

    fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            include_hidden_tests: false,
        }
    }

    /// Keeps the tests with the given IDs, along with everything within them.
    ///
    /// An ID without a source location also selects every test function with that name.
    pub fn including_ids(ids: impl IntoIterator<Item = TestId>) -> Self {
        Self::ids(ids, Membership::Including)
    }

    /// Removes the tests with the given IDs, along with everything within them.
    pub fn excluding_ids(ids: impl IntoIterator<Item = TestId>) -> Self {
        Self::ids(ids, Membership::Excluding)
    }

    fn ids(ids: impl IntoIterator<Item = TestId>, membership: Membership) -> Self {
        Self::new(FilterKind::TestIds {
            key_paths: ids.into_iter().map(|id| id.key_path()).collect(),
            membership,
        })
    }

    /// Keeps tests carrying any of `tags`.
    pub fn including_any_of(tags: impl IntoIterator<Item = Tag>) -> Self {
        Self::tags(tags, true, Membership::Including)
    }

    /// Keeps tests carrying all of `tags`.
    pub fn including_all_of(tags: impl IntoIterator<Item = Tag>) -> Self {
        Self::tags(tags, false, Membership::Including)
    }

    /// Removes tests carrying any of `tags`.
    pub fn excluding_any_of(tags: impl IntoIterator<Item = Tag>) -> Self {
        Self::tags(tags, true, Membership::Excluding)
    }

    /// Removes tests carrying all of `tags`.
    pub fn excluding_all_of(tags: impl IntoIterator<Item = Tag>) -> Self {
        Self::tags(tags, false, Membership::Excluding)
    }

    fn tags(tags: impl IntoIterator<Item = Tag>, any_of: bool, membership: Membership) -> Self {
        Self::new(FilterKind::Tags {
            tags: tags.into_iter().collect(),
            any_of,
            membership,
        })
    }

    /// Keeps tests whose ID (such as `Module.Suite.test()`) matches any of the regular
    /// expressions in `patterns`.
    ///
    /// Fails if any pattern is not a valid regular expression.
    pub fn including_patterns<I, S>(patterns: I) -> Result<Self, TestFilterBuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::patterns(patterns, Membership::Including)
    }

    /// Removes tests whose ID matches any of the regular expressions in `patterns`.
    ///
    /// Fails if any pattern is not a valid regular expression.
    pub fn excluding_patterns<I, S>(patterns: I) -> Result<Self, TestFilterBuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::patterns(patterns, Membership::Excluding)
    }

    fn patterns<I, S>(patterns: I, membership: Membership) -> Result<Self, TestFilterBuildError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).map_err(|err| TestFilterBuildError::new(pattern, err))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(FilterKind::Patterns {
            patterns,
            membership,
        }))
    }

    /// Keeps tests for which `predicate` returns `Ok(true)`.
    ///
    /// If `predicate` fails for any test, applying the filter fails.
    pub fn including_matching<F>(predicate: F) -> Self
    where
        F: Fn(&Test) -> Result<bool, TestError> + Send + Sync + 'static,
    {
        Self::new(FilterKind::Predicate {
            predicate: DebugIgnore(Arc::new(predicate)),
            membership: Membership::Including,
        })
    }

    /// Removes tests for which `predicate` returns `Ok(true)`.
    pub fn excluding_matching<F>(predicate: F) -> Self
    where
        F: Fn(&Test) -> Result<bool, TestError> + Send + Sync + 'static,
    {
        Self::new(FilterKind::Predicate {
            predicate: DebugIgnore(Arc::new(predicate)),
            membership: Membership::Excluding,
        })
    }

    /// Combines this filter with `other`.
    ///
    /// Hidden tests are included if either filter includes them.
    pub fn combining(self, other: TestFilter, operator: CombinationOperator) -> Self {
        Self {
            kind: FilterKind::Combination {
                lhs: Box::new(self.kind),
                rhs: Box::new(other.kind),
                operator,
            },
            include_hidden_tests: self.include_hidden_tests || other.include_hidden_tests,
        }
    }

    /// Sets whether hidden tests are kept.
    pub fn with_include_hidden_tests(mut self, include: bool) -> Self {
        self.include_hidden_tests = include;
        self
    }

    /// Returns true if this filter keeps every test.
    pub fn is_unfiltered(&self) -> bool {
        matches!(self.kind, FilterKind::Unfiltered)
    }

    /// Applies this filter to `graph`, returning the tests that remain.
    ///
    /// Branches left without any test are removed. The root node is always kept.
    pub fn apply(&self, graph: &TestGraph) -> Result<TestGraph, TestFilterError> {
        let tags = self.kind.requires_tags().then(|| inherited_tags(graph));
        let filtered = self.kind.apply(graph, tags.as_ref())?;
        let filtered = if self.include_hidden_tests {
            filtered
        } else {
            remove_hidden(&filtered)
        };
        let filtered = filtered.pruned();
        debug!(
            before = graph.value_count(),
            after = filtered.value_count(),
            "applied test filter"
        );
        Ok(filtered)
    }
}

impl Default for TestFilter {
    fn default() -> Self {
        Self::unfiltered()
    }
}

impl FilterKind {
    fn requires_tags(&self) -> bool {
        match self {
            FilterKind::Tags { .. } => true,
            FilterKind::Combination { lhs, rhs, .. } => lhs.requires_tags() || rhs.requires_tags(),
            FilterKind::Unfiltered
            | FilterKind::TestIds { .. }
            | FilterKind::Patterns { .. }
            | FilterKind::Predicate { .. } => false,
        }
    }

    fn apply(
        &self,
        graph: &TestGraph,
        tags: Option<&Graph<SmolStr, BTreeSet<Tag>>>,
    ) -> Result<TestGraph, TestFilterError> {
        match self {
            FilterKind::Unfiltered => Ok(graph.clone()),
            FilterKind::TestIds {
                key_paths,
                membership,
            } => Ok(select(graph, key_paths, *membership)),
            FilterKind::Tags {
                tags: wanted,
                any_of,
                membership,
            } => {
                let matched = matching_key_paths(graph, |key_path, _| {
                    let Some(tags) = tags.and_then(|tags| tags.get(key_path)) else {
                        return Ok(false);
                    };
                    Ok(if *any_of {
                        wanted.iter().any(|tag| tags.contains(tag))
                    } else {
                        wanted.iter().all(|tag| tags.contains(tag))
                    })
                })?;
                Ok(select(graph, &matched, *membership))
            }
            FilterKind::Patterns {
                patterns,
                membership,
            } => {
                let matched = matching_key_paths(graph, |_, test| {
                    let id = test.id.to_string();
                    Ok(patterns.iter().any(|pattern| pattern.is_match(&id)))
                })?;
                Ok(select(graph, &matched, *membership))
            }
            FilterKind::Predicate {
                predicate,
                membership,
            } => {
                let matched = matching_key_paths(graph, |_, test| {
                    predicate(test).map_err(|err| TestFilterError::new(test.id.clone(), err.to_string()))
                })?;
                Ok(select(graph, &matched, *membership))
            }
            FilterKind::Combination { lhs, rhs, operator } => {
                let lhs = lhs.apply(graph, tags)?;
                let rhs = rhs.apply(graph, tags)?;
                let operator = *operator;
                Ok(Graph::<_, ()>::zip(&lhs, &rhs).map_values(|_, pair| {
                    let (lhs, rhs) = pair?;
                    match operator {
                        CombinationOperator::And => lhs.clone().filter(|_| rhs.is_some()),
                        CombinationOperator::Or => lhs.clone().or_else(|| rhs.clone()),
                    }
                }))
            }
        }
    }
}

/// Computes the tags of every node, including those inherited from ancestors.
fn inherited_tags(graph: &TestGraph) -> Graph<SmolStr, BTreeSet<Tag>> {
    let mut tags: Graph<SmolStr, BTreeSet<Tag>> = Graph::new();
    for node in graph.iter() {
        let mut own = node
            .parent()
            .and_then(|parent| tags.get(parent.key_path()))
            .cloned()
            .unwrap_or_default();
        if let Some(test) = node.value() {
            own.extend(test.tags());
        }
        tags.insert(node.key_path(), own);
    }
    tags
}

/// Resolves the key paths of the tests matched by `matches`.
fn matching_key_paths(
    graph: &TestGraph,
    mut matches: impl FnMut(&[SmolStr], &Test) -> Result<bool, TestFilterError>,
) -> Result<HashSet<Vec<SmolStr>>, TestFilterError> {
    let mut matched = HashSet::new();
    for node in graph.iter() {
        if let Some(test) = node.value()
            && matches(node.key_path(), test)?
        {
            matched.insert(node.key_path().to_vec());
        }
    }
    Ok(matched)
}

/// Keeps or removes the nodes at `matched` key paths.
///
/// When including, a node is kept if it or any of its ancestors matched, or if it has a matching
/// descendant. When excluding, a node is removed if it or any of its ancestors matched.
fn select(graph: &TestGraph, matched: &HashSet<Vec<SmolStr>>, membership: Membership) -> TestGraph {
    let ancestors_of_matched: HashSet<&[SmolStr]> = matched
        .iter()
        .flat_map(|key_path| (0..key_path.len()).map(move |len| &key_path[..len]))
        .collect();

    graph.map_values(|key_path, test| {
        let test = test?;
        let self_or_ancestor_matched =
            (0..=key_path.len()).any(|len| matched.contains(&key_path[..len]));
        let keep = match membership {
            Membership::Including => {
                self_or_ancestor_matched || ancestors_of_matched.contains(key_path)
            }
            Membership::Excluding => !self_or_ancestor_matched,
        };
        keep.then(|| test.clone())
    })
}

/// Removes hidden tests and everything within them.
fn remove_hidden(graph: &TestGraph) -> TestGraph {
    let hidden: HashSet<Vec<SmolStr>> = graph
        .compact_map(|key_path, test| test.is_hidden().then(|| key_path.to_vec()))
        .into_iter()
        .collect();
    select(graph, &hidden, Membership::Excluding)
}
