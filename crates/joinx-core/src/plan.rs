//! # Join Trees
//!
//! The plan emitter receives the chosen order as a binary tree whose leaves are
//! the original relation ids. Internal nodes carry the estimates the search
//! recorded for them so that callers can report per-join sizes without asking
//! the cost model again.

use crate::cost::Cost;
use crate::relation_set::RelationId;
use serde::{Deserialize, Serialize};

/// A binary join tree over base relations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum JoinTree {
    /// Scan of one base relation.
    Leaf {
        relation: RelationId,
        cardinality: f64,
    },
    /// Join of two disjoint subtrees.
    Join {
        left: Box<JoinTree>,
        right: Box<JoinTree>,
        /// Estimated output rows.
        cardinality: f64,
        /// Accumulated cost of this subtree.
        cost: f64,
        /// No join edge connects the two sides.
        cross_product: bool,
    },
}

impl JoinTree {
    /// Estimated output rows of this node.
    pub fn cardinality(&self) -> f64 {
        match self {
            JoinTree::Leaf { cardinality, .. } | JoinTree::Join { cardinality, .. } => {
                *cardinality
            }
        }
    }

    /// Relations under this node, ascending.
    pub fn relations(&self) -> Vec<RelationId> {
        let mut out = Vec::new();
        self.collect_relations(&mut out);
        out.sort_unstable();
        out
    }

    fn collect_relations(&self, out: &mut Vec<RelationId>) {
        match self {
            JoinTree::Leaf { relation, .. } => out.push(*relation),
            JoinTree::Join { left, right, .. } => {
                left.collect_relations(out);
                right.collect_relations(out);
            }
        }
    }

    /// Number of join nodes.
    pub fn join_count(&self) -> usize {
        match self {
            JoinTree::Leaf { .. } => 0,
            JoinTree::Join { left, right, .. } => 1 + left.join_count() + right.join_count(),
        }
    }

    pub fn cross_product_count(&self) -> usize {
        match self {
            JoinTree::Leaf { .. } => 0,
            JoinTree::Join {
                left,
                right,
                cross_product,
                ..
            } => {
                usize::from(*cross_product) + left.cross_product_count() + right.cross_product_count()
            }
        }
    }

    /// True when every join has a leaf on at least one side.
    pub fn is_left_deep(&self) -> bool {
        match self {
            JoinTree::Leaf { .. } => true,
            JoinTree::Join { left, right, .. } => match (left.as_ref(), right.as_ref()) {
                (JoinTree::Leaf { .. }, other) | (other, JoinTree::Leaf { .. }) => {
                    other.is_left_deep()
                }
                _ => false,
            },
        }
    }

    /// Indented multi-line rendering, one node per line.
    pub fn display(&self, indent: usize) -> String {
        let pad = "  ".repeat(indent);
        match self {
            JoinTree::Leaf {
                relation,
                cardinality,
            } => format!("{pad}Scan r{relation} (rows={cardinality:.0})\n"),
            JoinTree::Join {
                left,
                right,
                cardinality,
                cost,
                cross_product,
            } => {
                let kind = if *cross_product { "CrossJoin" } else { "Join" };
                let mut out = format!("{pad}{kind} (rows={cardinality:.0}, cost={cost:.1})\n");
                out.push_str(&left.display(indent + 1));
                out.push_str(&right.display(indent + 1));
                out
            }
        }
    }
}

/// Result of one optimization pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedPlan {
    /// `None` when the pass had no relations to join.
    pub tree: Option<JoinTree>,
    /// Total cost of the tree; zero for an empty pass.
    pub cost: Cost,
    /// Estimated output rows of the root.
    pub cardinality: f64,
    /// Entries in the DP table when the pass finished.
    pub table_entries: usize,
}

impl OptimizedPlan {
    pub fn empty() -> Self {
        Self {
            tree: None,
            cost: Cost::zero(),
            cardinality: 0.0,
            table_entries: 0,
        }
    }
}
