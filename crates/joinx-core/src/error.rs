//! Recoverable planning failures.
//!
//! Programming errors (overlapping unions, out-of-range relation ids) panic at
//! the point of detection instead of appearing here.

use crate::relation_set::RelationId;

pub type Result<T> = std::result::Result<T, JoinOrderError>;

/// Errors reported by the join order search and the join graph builder.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JoinOrderError {
    /// The relation count exceeds the configured exhaustive-search limit. The
    /// caller is expected to fall back to a heuristic planner.
    #[error("exhaustive join order search infeasible: {relations} relations exceed the limit of {limit}")]
    SearchInfeasible { relations: usize, limit: usize },
    /// The join graph is disconnected and cross products are disabled.
    #[error("no connected join order: the join graph has {components} disconnected components and cross products are not allowed")]
    NoConnectedCompletion { components: usize },
    /// A join edge names a relation the graph does not have.
    #[error("join edge references relation {relation}, but the graph has only {relation_count} relations")]
    UnknownRelation {
        relation: RelationId,
        relation_count: usize,
    },
    /// A join edge connects a relation to itself.
    #[error("join edge connects relation {relation} to itself")]
    SelfLoop { relation: RelationId },
    #[error("join edge {left}-{right} has invalid selectivity {selectivity}")]
    InvalidSelectivity {
        left: RelationId,
        right: RelationId,
        selectivity: f64,
    },
    /// The number of base cardinalities differs from the graph's relation count.
    #[error("expected {expected} base cardinalities, got {actual}")]
    CardinalityMismatch { expected: usize, actual: usize },
}
