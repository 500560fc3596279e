//! # Join Graph
//!
//! The join graph is the search's view of which relations can be joined
//! without a cross product. Nodes are base relations; edges are join
//! predicates, each carrying a selectivity supplied by whoever built the graph
//! (the binder, with help from the cardinality estimator). The search never
//! computes selectivities itself; it only passes them on to the cost model.
//!
//! ## Queries
//!
//! - **`neighbors`**: every relation outside a set that shares at least one edge
//!   with a member of the set, in ascending order.
//! - **`edge_cost`**: the combined selectivity of all edges crossing two
//!   disjoint sets, or `None` if no edge crosses them. Multiple crossing edges
//!   multiply (predicates are assumed independent).
//!
//! ## `InMemoryJoinGraph`
//!
//! The provided implementation stores a per-relation adjacency map. Parallel
//! edges between the same pair of relations fold into one entry whose
//! selectivity is the product of theirs. Maps are ordered so that neighbor lists
//! come out sorted without an extra pass.

use crate::error::{JoinOrderError, Result};
use crate::relation_set::RelationId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Read-only adjacency view consumed by the search.
pub trait JoinGraph: Send + Sync {
    /// Number of base relations (`N`); relation ids are `0..N`.
    fn relation_count(&self) -> usize;

    /// Relations outside `members` connected to at least one member, ascending.
    ///
    /// `members` must be ascending and duplicate-free.
    fn neighbors(&self, members: &[RelationId]) -> Vec<RelationId>;

    /// Combined selectivity of the edges crossing `left` and `right`, or `None`
    /// when the two sets are not connected.
    ///
    /// Both slices must be ascending and disjoint.
    fn edge_cost(&self, left: &[RelationId], right: &[RelationId]) -> Option<f64>;
}

/// A join predicate between two base relations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JoinEdge {
    /// One endpoint. Edges are undirected, so the order of the endpoints carries no meaning.
    pub left: RelationId,
    pub right: RelationId,
    /// Fraction of the cross product that survives the predicate, in `(0, 1]`
    /// for a filtering predicate. Values above 1 are accepted for expanding joins.
    pub selectivity: f64,
}

impl JoinEdge {
    pub fn new(left: RelationId, right: RelationId, selectivity: f64) -> Self {
        Self {
            left,
            right,
            selectivity,
        }
    }
}

/// Adjacency-map join graph built from a list of edges.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJoinGraph {
    relation_count: usize,
    adjacency: Vec<BTreeMap<RelationId, f64>>,
}

impl InMemoryJoinGraph {
    /// A graph over `relation_count` relations with no edges.
    pub fn new(relation_count: usize) -> Self {
        Self {
            relation_count,
            adjacency: vec![BTreeMap::new(); relation_count],
        }
    }

    /// Build a graph and add every edge, stopping at the first invalid one.
    pub fn with_edges<I>(relation_count: usize, edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = JoinEdge>,
    {
        let mut graph = Self::new(relation_count);
        for edge in edges {
            graph.add_edge(edge)?;
        }
        Ok(graph)
    }

    /// Add an undirected join edge.
    pub fn add_edge(&mut self, edge: JoinEdge) -> Result<()> {
        for relation in [edge.left, edge.right] {
            if relation >= self.relation_count {
                return Err(JoinOrderError::UnknownRelation {
                    relation,
                    relation_count: self.relation_count,
                });
            }
        }
        if edge.left == edge.right {
            return Err(JoinOrderError::SelfLoop {
                relation: edge.left,
            });
        }
        if !edge.selectivity.is_finite() || edge.selectivity <= 0.0 {
            return Err(JoinOrderError::InvalidSelectivity {
                left: edge.left,
                right: edge.right,
                selectivity: edge.selectivity,
            });
        }

        *self.adjacency[edge.left].entry(edge.right).or_insert(1.0) *= edge.selectivity;
        *self.adjacency[edge.right].entry(edge.left).or_insert(1.0) *= edge.selectivity;
        Ok(())
    }
}

impl JoinGraph for InMemoryJoinGraph {
    fn relation_count(&self) -> usize {
        self.relation_count
    }

    fn neighbors(&self, members: &[RelationId]) -> Vec<RelationId> {
        let mut neighbors = BTreeSet::new();
        for &member in members {
            for &adjacent in self.adjacency[member].keys() {
                if members.binary_search(&adjacent).is_err() {
                    neighbors.insert(adjacent);
                }
            }
        }
        neighbors.into_iter().collect()
    }

    fn edge_cost(&self, left: &[RelationId], right: &[RelationId]) -> Option<f64> {
        let mut selectivity = None;
        for &l in left {
            for (&r, &s) in &self.adjacency[l] {
                if right.binary_search(&r).is_ok() {
                    selectivity = Some(selectivity.unwrap_or(1.0) * s);
                }
            }
        }
        selectivity
    }
}
