//! # Join-Graph Optimization Endpoint
//!
//! This module implements the protocol between a query coordinator and the DP
//! join order search. The coordinator sends only what join ordering needs:
//!
//! - **Tables**: id, name, row count, and per-column NDV statistics
//! - **Joins**: equi-join conditions between pairs of tables
//!
//! The handler turns the tables into dense relation ids, derives a selectivity
//! for every join edge, runs one `DpSearch` pass, and maps the resulting tree
//! back to table ids and join columns.
//!
//! ## Wire Protocol
//!
//! - Request: `POST /optimize/join-graph` with JSON body (`JoinGraphRequest`)
//! - Response: JSON body (`JoinGraphResponse`) with the optimized join tree
//!
//! ## Limitations
//!
//! - **Inner joins only**: every edge is treated as a freely reorderable inner
//!   equi-join. Outer joins carry ordering constraints that this protocol does
//!   not describe.
//! - **No filter selectivity**: table-level predicates must already be folded
//!   into `rowCount` by the caller.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use joinx_core::join_graph::{InMemoryJoinGraph, JoinEdge};
use joinx_core::plan::JoinTree;
use joinx_core::relation_set::RelationId;
use joinx_core::search::DpSearch;
use joinx_core::JoinOrderError;

use crate::state::AppState;

type ApiError = (StatusCode, String);

// ---------------------------------------------------------------------------
// JSON wire-protocol types
// ---------------------------------------------------------------------------

/// Request body for `POST /optimize/join-graph`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGraphRequest {
    /// Tables participating in the join graph. Their position in this list is
    /// the relation id used by the search.
    pub tables: Vec<TableInfo>,
    /// Equi-join conditions connecting pairs of tables.
    #[serde(default)]
    pub joins: Vec<JoinCondition>,
    /// Overrides the server's cross-product policy for this request.
    #[serde(default)]
    pub allow_cross_products: Option<bool>,
}

/// A table in the join graph with its statistics.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    /// Unique identifier for this table within the request (e.g., "t0", "t1").
    pub id: String,
    /// Schema name (e.g., "tpch"). Informational; ordering never reads it.
    #[serde(default)]
    pub schema: String,
    /// Table name (e.g., "customer"). Informational; ordering never reads it.
    pub name: String,
    /// Estimated row count after table-level filters.
    pub row_count: f64,
    /// Statistics for the columns that appear in join conditions.
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

/// Per-column statistics for selectivity estimation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    /// Column name, matched against `JoinCondition` column names.
    pub name: String,
    /// Number of distinct values (NDV).
    pub ndv: f64,
}

/// An equi-join condition `left_table.left_column = right_table.right_column`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinCondition {
    /// ID of the left table (must match a `TableInfo.id`).
    pub left_table_id: String,
    /// ID of the right table (must match a `TableInfo.id`).
    pub right_table_id: String,
    /// Column name on the left side of the equi-join condition.
    pub left_column: String,
    /// Column name on the right side of the equi-join condition.
    pub right_column: String,
    /// Explicit selectivity. Derived from column NDVs when absent.
    #[serde(default)]
    pub selectivity: Option<f64>,
}

/// Response body from the join-graph optimization endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGraphResponse {
    /// The optimized join tree, or `null` when the request had no tables.
    pub tree: Option<JoinTreeNode>,
    /// Total estimated cost of the optimized plan.
    pub cost: f64,
    /// Estimated output rows of the root.
    pub estimated_rows: f64,
    /// Number of connected subsets the search planned.
    pub dp_entries: usize,
}

/// A node in the optimized join tree.
///
/// Leaves reference tables by ID; internal nodes join two subtrees. Every node
/// carries the row estimate the search recorded for it.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum JoinTreeNode {
    /// A leaf node referencing a table by its ID.
    Leaf {
        #[serde(rename = "tableId")]
        table_id: String,
        #[serde(rename = "estimatedRows")]
        estimated_rows: f64,
    },
    /// A join node combining two subtrees.
    Join {
        /// `INNER` or `CROSS`.
        #[serde(rename = "joinType")]
        join_type: String,
        /// Conditions oriented so that `leftColumn` belongs to the left subtree.
        conditions: Vec<ConditionPair>,
        /// Estimated output rows of this join.
        #[serde(rename = "estimatedRows")]
        estimated_rows: f64,
        left: Box<JoinTreeNode>,
        right: Box<JoinTreeNode>,
    },
}

/// One equi-join condition applied at a join node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionPair {
    /// Column from a table in the node's left subtree.
    pub left_column: String,
    /// Column from a table in the node's right subtree.
    pub right_column: String,
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// POST /optimize/join-graph: optimize join ordering via DP over connected subsets.
pub async fn optimize_join_graph(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JoinGraphRequest>,
) -> Result<Json<JoinGraphResponse>, ApiError> {
    let table_index = index_tables(&req)?;
    let edges = resolve_joins(&req, &table_index)?;

    let graph = InMemoryJoinGraph::with_edges(
        req.tables.len(),
        edges
            .iter()
            .map(|edge| JoinEdge::new(edge.left, edge.right, edge.selectivity)),
    )
    .map_err(into_api_error)?;

    let config = state.config.search_config(req.allow_cross_products);
    let rows: Vec<f64> = req.tables.iter().map(|t| t.row_count).collect();

    let mut search = DpSearch::new(Arc::new(graph), state.cost_model.clone(), config);
    let plan = search.optimize(&rows).map_err(into_api_error)?;

    debug!(
        "Optimized join graph: {} tables, {} joins, {} DP entries, cost {:.1}",
        req.tables.len(),
        req.joins.len(),
        plan.table_entries,
        plan.cost.total
    );

    let tree = plan
        .tree
        .as_ref()
        .map(|tree| tree_to_node(tree, &req, &edges));

    Ok(Json(JoinGraphResponse {
        tree,
        cost: plan.cost.total,
        estimated_rows: plan.cardinality,
        dp_entries: plan.table_entries,
    }))
}

// ---------------------------------------------------------------------------
// Join graph construction
// ---------------------------------------------------------------------------

/// A request join resolved to relation ids.
#[derive(Debug, Clone, PartialEq)]
struct ResolvedJoin {
    left: RelationId,
    right: RelationId,
    left_column: String,
    right_column: String,
    selectivity: f64,
}

/// Map table ids to relation ids, rejecting duplicates and unusable row counts.
fn index_tables(req: &JoinGraphRequest) -> Result<HashMap<&str, RelationId>, ApiError> {
    let mut index = HashMap::with_capacity(req.tables.len());
    for (relation, table) in req.tables.iter().enumerate() {
        if !table.row_count.is_finite() || table.row_count < 0.0 {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Table {} has invalid row count {}", table.id, table.row_count),
            ));
        }
        if index.insert(table.id.as_str(), relation).is_some() {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Duplicate table ID: {}", table.id),
            ));
        }
    }
    Ok(index)
}

fn resolve_joins(
    req: &JoinGraphRequest,
    table_index: &HashMap<&str, RelationId>,
) -> Result<Vec<ResolvedJoin>, ApiError> {
    let lookup = |id: &str| {
        table_index.get(id).copied().ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("Unknown table ID: {}", id),
            )
        })
    };

    req.joins
        .iter()
        .map(|join| -> Result<ResolvedJoin, ApiError> {
            let left = lookup(&join.left_table_id)?;
            let right = lookup(&join.right_table_id)?;
            let selectivity = join.selectivity.unwrap_or_else(|| {
                let left_ndv = column_ndv(&req.tables[left], &join.left_column);
                let right_ndv = column_ndv(&req.tables[right], &join.right_column);
                equi_join_selectivity(left_ndv, right_ndv)
            });
            Ok(ResolvedJoin {
                left,
                right,
                left_column: join.left_column.clone(),
                right_column: join.right_column.clone(),
                selectivity,
            })
        })
        .collect()
}

/// NDV of a join column; a column without statistics is assumed unique.
fn column_ndv(table: &TableInfo, column: &str) -> f64 {
    table
        .columns
        .iter()
        .find(|c| c.name == column)
        .map_or(table.row_count, |c| c.ndv)
}

/// Selectivity of `a = b` under the containment assumption.
fn equi_join_selectivity(left_ndv: f64, right_ndv: f64) -> f64 {
    1.0 / left_ndv.max(right_ndv).max(1.0)
}

fn into_api_error(err: JoinOrderError) -> ApiError {
    let status = match err {
        JoinOrderError::SearchInfeasible { .. } | JoinOrderError::NoConnectedCompletion { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        JoinOrderError::UnknownRelation { .. }
        | JoinOrderError::SelfLoop { .. }
        | JoinOrderError::InvalidSelectivity { .. }
        | JoinOrderError::CardinalityMismatch { .. } => StatusCode::BAD_REQUEST,
    };
    (status, err.to_string())
}

// ---------------------------------------------------------------------------
// Tree → response conversion
// ---------------------------------------------------------------------------

fn tree_to_node(tree: &JoinTree, req: &JoinGraphRequest, joins: &[ResolvedJoin]) -> JoinTreeNode {
    match tree {
        JoinTree::Leaf { relation, .. } => JoinTreeNode::Leaf {
            table_id: req.tables[*relation].id.clone(),
            estimated_rows: tree.cardinality(),
        },
        JoinTree::Join {
            left,
            right,
            cross_product,
            ..
        } => {
            let left_relations = left.relations();
            let right_relations = right.relations();
            let conditions = crossing_conditions(joins, &left_relations, &right_relations);
            JoinTreeNode::Join {
                join_type: if *cross_product { "CROSS" } else { "INNER" }.to_string(),
                conditions,
                estimated_rows: tree.cardinality(),
                left: Box::new(tree_to_node(left, req, joins)),
                right: Box::new(tree_to_node(right, req, joins)),
            }
        }
    }
}

/// Conditions with one side in each subtree, in request order.
fn crossing_conditions(
    joins: &[ResolvedJoin],
    left: &[RelationId],
    right: &[RelationId],
) -> Vec<ConditionPair> {
    let in_left = |r: &RelationId| left.binary_search(r).is_ok();
    let in_right = |r: &RelationId| right.binary_search(r).is_ok();

    joins
        .iter()
        .filter_map(|join| {
            if in_left(&join.left) && in_right(&join.right) {
                Some(ConditionPair {
                    left_column: join.left_column.clone(),
                    right_column: join.right_column.clone(),
                })
            } else if in_left(&join.right) && in_right(&join.left) {
                Some(ConditionPair {
                    left_column: join.right_column.clone(),
                    right_column: join.left_column.clone(),
                })
            } else {
                None
            }
        })
        .collect()
}
