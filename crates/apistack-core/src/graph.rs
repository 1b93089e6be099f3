//! Dependency graph of declared stack nodes.
//!
//! Every asset, derived value, resource, and output declared on a stack is
//! a node. An edge `a -> b` records that `a` reads a value produced by `b`,
//! so `b` must be evaluated first. [`DependencyGraph::topological_order`]
//! returns the evaluation order; ties are broken by declaration order so the
//! result is deterministic.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::fmt;

use tracing::trace;

use crate::error::{CoreError, CoreResult};
use crate::types::LogicalId;

/// What a graph node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A file or directory staged for upload (bundled or not).
    Asset,
    /// A value computed from other nodes, not provisioned on its own.
    Derived,
    /// A provisioned cloud resource.
    Resource,
    /// A stack output.
    Output,
}

impl NodeKind {
    /// Lowercase name used in logs and plans.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Derived => "derived",
            Self::Resource => "resource",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    /// Logical ID of the node.
    pub id: LogicalId,
    /// Kind of the node.
    pub kind: NodeKind,
    /// Position in declaration order.
    pub index: usize,
}

/// Directed acyclic graph of stack nodes keyed by logical ID.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    nodes: Vec<GraphNode>,
    by_id: HashMap<LogicalId, usize>,
    /// `dependencies[i]` holds the indices node `i` depends on.
    dependencies: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a new node.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateLogicalId`] if the ID is already taken.
    pub fn add_node(&mut self, id: LogicalId, kind: NodeKind) -> CoreResult<&GraphNode> {
        if self.by_id.contains_key(&id) {
            return Err(CoreError::DuplicateLogicalId(id.to_string()));
        }
        let index = self.nodes.len();
        trace!(logical_id = %id, kind = %kind, index, "graph node added");
        self.by_id.insert(id.clone(), index);
        self.nodes.push(GraphNode { id, kind, index });
        self.dependencies.push(BTreeSet::new());
        Ok(&self.nodes[index])
    }

    /// Record that `dependent` reads a value produced by `dependency`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UndeclaredReference`] if either node is unknown,
    /// or [`CoreError::DependencyCycle`] for a self-reference.
    pub fn add_dependency(&mut self, dependent: &LogicalId, dependency: &LogicalId) -> CoreResult<()> {
        let from = self
            .index_of(dependent)
            .ok_or_else(|| anyhow::anyhow!("dependent node {dependent} is not in the graph"))?;
        let to = self.index_of(dependency).ok_or_else(|| CoreError::UndeclaredReference {
            from: dependent.to_string(),
            to: dependency.to_string(),
        })?;
        if from == to {
            return Err(CoreError::DependencyCycle(vec![dependent.to_string()]));
        }
        self.dependencies[from].insert(to);
        Ok(())
    }

    /// Whether a node with this ID exists.
    #[must_use]
    pub fn contains(&self, id: &LogicalId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Look up a node by ID.
    #[must_use]
    pub fn node(&self, id: &LogicalId) -> Option<&GraphNode> {
        self.index_of(id).map(|i| &self.nodes[i])
    }

    /// Direct dependencies of a node, in declaration order.
    #[must_use]
    pub fn dependencies_of(&self, id: &LogicalId) -> Vec<&LogicalId> {
        self.index_of(id)
            .map(|i| {
                self.dependencies[i]
                    .iter()
                    .map(|&d| &self.nodes[d].id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `ancestor` is reachable from `id` through dependency edges.
    #[must_use]
    pub fn depends_on_transitively(&self, id: &LogicalId, ancestor: &LogicalId) -> bool {
        let (Some(start), Some(target)) = (self.index_of(id), self.index_of(ancestor)) else {
            return false;
        };
        let mut stack = vec![start];
        let mut seen = BTreeSet::new();
        while let Some(current) = stack.pop() {
            for &dep in &self.dependencies[current] {
                if dep == target {
                    return true;
                }
                if seen.insert(dep) {
                    stack.push(dep);
                }
            }
        }
        false
    }

    /// All nodes in declaration order.
    #[must_use]
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Evaluation order: every node appears after all of its dependencies.
    ///
    /// Uses Kahn's algorithm with a min-heap on declaration index, so among
    /// nodes that are ready at the same time the earliest declared wins.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DependencyCycle`] listing the nodes that could
    /// not be ordered.
    pub fn topological_order(&self) -> CoreResult<Vec<&GraphNode>> {
        let n = self.nodes.len();
        let mut remaining: Vec<usize> = self.dependencies.iter().map(BTreeSet::len).collect();
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (node, deps) in self.dependencies.iter().enumerate() {
            for &dep in deps {
                dependents[dep].push(node);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = remaining
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(i)) = ready.pop() {
            order.push(&self.nodes[i]);
            for &dependent in &dependents[i] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() != n {
            let stuck = remaining
                .iter()
                .enumerate()
                .filter(|(_, count)| **count > 0)
                .map(|(i, _)| self.nodes[i].id.to_string())
                .collect();
            return Err(CoreError::DependencyCycle(stuck));
        }
        Ok(order)
    }

    fn index_of(&self, id: &LogicalId) -> Option<usize> {
        self.by_id.get(id).copied()
    }
}
