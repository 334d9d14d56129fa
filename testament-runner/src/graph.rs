// Copyright (c) The testament Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! An ordered tree addressed by key paths.
//!
//! [`Graph`] is used throughout testament to represent hierarchies: discovered
//! tests, filtered tests, plan steps and the per-test data aggregated by
//! recorders.
//!
//! # Representation
//!
//! The tree is stored as an arena: a flat vector of nodes holding explicit
//! parent and child indices, plus a side map from full key paths to node
//! indices. Looking up a node by key path is a single hash lookup, and there
//! are no reference cycles to worry about.
//!
//! Every node has an optional value. Nodes without a value are pure path
//! segments, created on demand when a value is inserted below them. The root
//! node always exists and has the empty key path.

use std::{
    collections::{HashMap, hash_map::Entry},
    fmt,
    hash::Hash,
};

/// The index of a node within a [`Graph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(usize);

impl NodeIndex {
    /// The index of the root node of every graph.
    pub const ROOT: NodeIndex = NodeIndex(0);
}

/// An ordered tree of optional values, addressed by key paths.
///
/// For more, see the [module-level documentation](self).
#[derive(Clone)]
pub struct Graph<K, V> {
    nodes: Vec<Node<K, V>>,
    index: HashMap<Vec<K>, NodeIndex>,
}

#[derive(Clone, Debug)]
struct Node<K, V> {
    key_path: Vec<K>,
    value: Option<V>,
    parent: Option<NodeIndex>,
    children: Vec<NodeIndex>,
}

impl<K: Clone + Eq + Hash, V> Graph<K, V> {
    /// Creates a new graph consisting of a root node with no value.
    pub fn new() -> Self {
        let mut index = HashMap::new();
        index.insert(Vec::new(), NodeIndex::ROOT);
        Self {
            nodes: vec![Node {
                key_path: Vec::new(),
                value: None,
                parent: None,
                children: Vec::new(),
            }],
            index,
        }
    }

    /// Creates a new graph whose root node holds `value`.
    pub fn with_root_value(value: V) -> Self {
        let mut graph = Self::new();
        graph.nodes[0].value = Some(value);
        graph
    }

    /// Returns the total number of nodes, including the root and nodes without values.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of nodes holding a value.
    pub fn value_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.value.is_some()).count()
    }

    /// Inserts `value` at `key_path`, creating any missing intermediate nodes.
    ///
    /// Existing intermediate nodes are left untouched. Returns the value
    /// previously stored at `key_path`, if any.
    pub fn insert(&mut self, key_path: &[K], value: V) -> Option<V> {
        let index = self.ensure_node(key_path);
        self.nodes[index.0].value.replace(value)
    }

    /// Ensures that a node exists at `key_path`, returning its index.
    pub fn ensure_node(&mut self, key_path: &[K]) -> NodeIndex {
        if let Some(index) = self.index.get(key_path) {
            return *index;
        }

        // Walk down from the longest existing prefix.
        let mut parent = NodeIndex::ROOT;
        for len in 1..=key_path.len() {
            let prefix = &key_path[..len];
            parent = match self.index.entry(prefix.to_vec()) {
                Entry::Occupied(entry) => *entry.get(),
                Entry::Vacant(entry) => {
                    let index = NodeIndex(self.nodes.len());
                    entry.insert(index);
                    self.nodes.push(Node {
                        key_path: prefix.to_vec(),
                        value: None,
                        parent: Some(parent),
                        children: Vec::new(),
                    });
                    self.nodes[parent.0].children.push(index);
                    index
                }
            };
        }
        parent
    }

    /// Returns the value at exactly `key_path`.
    ///
    /// Returns `None` if no node exists at `key_path`, or if the node has no value.
    pub fn get(&self, key_path: &[K]) -> Option<&V> {
        let index = self.index.get(key_path)?;
        self.nodes[index.0].value.as_ref()
    }

    /// Returns a mutable reference to the value at exactly `key_path`.
    pub fn get_mut(&mut self, key_path: &[K]) -> Option<&mut V> {
        let index = self.index.get(key_path)?;
        self.nodes[index.0].value.as_mut()
    }

    /// Returns a mutable reference to the value at `key_path`, inserting the
    /// result of `default` (and any intermediate nodes) if there is none.
    pub fn get_or_insert_with(&mut self, key_path: &[K], default: impl FnOnce() -> V) -> &mut V {
        let index = self.ensure_node(key_path);
        self.nodes[index.0].value.get_or_insert_with(default)
    }

    /// Returns true if a node (with or without a value) exists at `key_path`.
    pub fn contains_node(&self, key_path: &[K]) -> bool {
        self.index.contains_key(key_path)
    }

    /// Returns the root node.
    pub fn root(&self) -> NodeRef<'_, K, V> {
        self.node_at(NodeIndex::ROOT)
    }

    /// Returns the node at `key_path`, if it exists.
    pub fn node(&self, key_path: &[K]) -> Option<NodeRef<'_, K, V>> {
        let index = self.index.get(key_path)?;
        Some(self.node_at(*index))
    }

    /// Returns the node at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` was not produced by this graph.
    pub fn node_at(&self, index: NodeIndex) -> NodeRef<'_, K, V> {
        assert!(
            index.0 < self.nodes.len(),
            "node index {index:?} out of range for graph with {} nodes",
            self.nodes.len()
        );
        NodeRef { graph: self, index }
    }

    /// Iterates over all nodes in pre-order, starting at the root.
    pub fn iter(&self) -> PreOrder<'_, K, V> {
        self.root().pre_order()
    }

    /// Calls `f` for every node holding a value, in pre-order.
    pub fn for_each(&self, mut f: impl FnMut(&[K], &V)) {
        for node in self.iter() {
            if let Some(value) = node.value() {
                f(node.key_path(), value);
            }
        }
    }

    /// Maps every value in pre-order, collecting the non-`None` results.
    pub fn compact_map<U>(&self, mut f: impl FnMut(&[K], &V) -> Option<U>) -> Vec<U> {
        self.iter()
            .filter_map(|node| node.value().and_then(|value| f(node.key_path(), value)))
            .collect()
    }

    /// Produces a graph of identical shape whose values are computed by `f`.
    ///
    /// `f` is called for every node, including nodes without a value. Nodes for
    /// which `f` returns `None` remain in the new graph as pure path nodes.
    pub fn map_values<U>(&self, mut f: impl FnMut(&[K], Option<&V>) -> Option<U>) -> Graph<K, U> {
        let nodes = self
            .nodes
            .iter()
            .map(|node| Node {
                key_path: node.key_path.clone(),
                value: f(&node.key_path, node.value.as_ref()),
                parent: node.parent,
                children: node.children.clone(),
            })
            .collect();
        Graph {
            nodes,
            index: self.index.clone(),
        }
    }

    /// Returns a copy of the subtree rooted at `key_path`, or `None` if no node
    /// exists there.
    ///
    /// Key paths in the returned graph are relative to `key_path`.
    pub fn subgraph(&self, key_path: &[K]) -> Option<Graph<K, V>>
    where
        V: Clone,
    {
        let root = self.node(key_path)?;
        let prefix_len = key_path.len();
        let mut subgraph = match root.value() {
            Some(value) => Graph::with_root_value(value.clone()),
            None => Graph::new(),
        };
        for node in root.descendants() {
            let relative = &node.key_path()[prefix_len..];
            let index = subgraph.ensure_node(relative);
            subgraph.nodes[index.0].value = node.value().cloned();
        }
        Some(subgraph)
    }

    /// Returns a copy of this graph with every node that has no value and no
    /// descendant with a value removed.
    ///
    /// The root node is always preserved, even if it has no value.
    pub fn pruned(&self) -> Graph<K, V>
    where
        V: Clone,
    {
        let mut keep = vec![false; self.nodes.len()];
        // Children always have larger indexes than their parents, so a reverse
        // scan visits every child before its parent.
        for (i, node) in self.nodes.iter().enumerate().rev() {
            if node.value.is_some() || node.children.iter().any(|child| keep[child.0]) {
                keep[i] = true;
            }
        }
        keep[0] = true;

        let mut pruned = match &self.nodes[0].value {
            Some(value) => Graph::with_root_value(value.clone()),
            None => Graph::new(),
        };
        for node in self.iter().skip(1) {
            if keep[node.index.0] {
                let index = pruned.ensure_node(node.key_path());
                pruned.nodes[index.0].value = node.value().cloned();
            }
        }
        pruned
    }

    /// Merges two graphs into one whose shape is the union of both.
    ///
    /// Every node in the result holds a pair of the values found at that key
    /// path in `a` and `b`; a side that has no node (or no value) at the key
    /// path contributes `None`. Children of nodes present in both graphs are
    /// ordered as in `a`, followed by children only present in `b`.
    pub fn zip<A, B>(a: &Graph<K, A>, b: &Graph<K, B>) -> Graph<K, (Option<A>, Option<B>)>
    where
        A: Clone,
        B: Clone,
    {
        let mut zipped = Graph::new();
        for node in a.iter() {
            zipped.ensure_node(node.key_path());
        }
        for node in b.iter() {
            zipped.ensure_node(node.key_path());
        }
        for node in &mut zipped.nodes {
            node.value = Some((
                a.get(&node.key_path).cloned(),
                b.get(&node.key_path).cloned(),
            ));
        }
        zipped
    }
}

impl<K: Clone + Eq + Hash, V> Default for Graph<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Eq + Hash, V> FromIterator<(Vec<K>, V)> for Graph<K, V> {
    fn from_iter<T: IntoIterator<Item = (Vec<K>, V)>>(iter: T) -> Self {
        let mut graph = Self::new();
        for (key_path, value) in iter {
            graph.insert(&key_path, value);
        }
        graph
    }
}

impl<K: fmt::Debug + Clone + Eq + Hash, V: fmt::Debug> fmt::Debug for Graph<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.iter()
                    .map(|node| (node.key_path().to_vec(), node.value())),
            )
            .finish()
    }
}

/// A borrowed view of a single node in a [`Graph`].
pub struct NodeRef<'g, K, V> {
    graph: &'g Graph<K, V>,
    index: NodeIndex,
}

impl<K, V> Clone for NodeRef<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for NodeRef<'_, K, V> {}

impl<'g, K: Clone + Eq + Hash, V> NodeRef<'g, K, V> {
    /// Returns the index of this node.
    pub fn index(&self) -> NodeIndex {
        self.index
    }

    /// Returns the full key path of this node.
    pub fn key_path(&self) -> &'g [K] {
        &self.graph.nodes[self.index.0].key_path
    }

    /// Returns the last segment of this node's key path, or `None` for the root.
    pub fn key(&self) -> Option<&'g K> {
        self.key_path().last()
    }

    /// Returns the value at this node, if any.
    pub fn value(&self) -> Option<&'g V> {
        self.graph.nodes[self.index.0].value.as_ref()
    }

    /// Returns the parent of this node, or `None` for the root.
    pub fn parent(&self) -> Option<NodeRef<'g, K, V>> {
        let parent = self.graph.nodes[self.index.0].parent?;
        Some(self.graph.node_at(parent))
    }

    /// Returns true if this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.graph.nodes[self.index.0].children.is_empty()
    }

    /// Iterates over the direct children of this node, in insertion order.
    pub fn children(self) -> impl ExactSizeIterator<Item = NodeRef<'g, K, V>> + 'g {
        let graph = self.graph;
        graph.nodes[self.index.0]
            .children
            .iter()
            .map(move |&index| NodeRef { graph, index })
    }

    /// Iterates over this node and all of its descendants in pre-order.
    pub fn pre_order(self) -> PreOrder<'g, K, V> {
        PreOrder {
            graph: self.graph,
            stack: vec![self.index],
        }
    }

    /// Iterates over all descendants of this node in pre-order, excluding the node itself.
    pub fn descendants(self) -> impl Iterator<Item = NodeRef<'g, K, V>> + 'g {
        self.pre_order().skip(1)
    }

    /// Iterates over this node's ancestors, nearest first, excluding the node itself.
    pub fn ancestors(self) -> impl Iterator<Item = NodeRef<'g, K, V>> + 'g {
        std::iter::successors(self.parent(), |node| node.parent())
    }
}

impl<K: fmt::Debug + Clone + Eq + Hash, V: fmt::Debug> fmt::Debug for NodeRef<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("key_path", &self.key_path())
            .field("value", &self.value())
            .finish()
    }
}

/// A pre-order iterator over the nodes of a [`Graph`].
///
/// Returned by [`Graph::iter`] and [`NodeRef::pre_order`].
pub struct PreOrder<'g, K, V> {
    graph: &'g Graph<K, V>,
    stack: Vec<NodeIndex>,
}

impl<'g, K, V> Iterator for PreOrder<'g, K, V> {
    type Item = NodeRef<'g, K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.stack.pop()?;
        // Push children in reverse so that the first child is visited first.
        self.stack
            .extend(self.graph.nodes[index.0].children.iter().rev().copied());
        Some(NodeRef {
            graph: self.graph,
            index,
        })
    }
}
