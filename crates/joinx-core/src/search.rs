//! # Dynamic-Programming Join Order Search
//!
//! This module implements the bottom-up join enumeration that picks the join
//! order for one query. The search grows a table of best-known plans keyed by
//! canonical relation set, starting from the base relations and ending at the
//! set that contains all of them.
//!
//! ## How It Works
//!
//! 1. **Seed**: every base relation `r` gets a table entry for `{r}` holding a
//!    scan estimate from the cost model.
//! 2. **Grow**: for each subset size `k = 2..=N`, every existing entry `S` with
//!    `|S| < k` asks the join graph for its neighbors and tries every subset `T`
//!    of them with `|T| = k - |S|`. A `T` with more than one relation is only
//!    usable once it has its own entry, which guarantees it is connected. The
//!    candidate `U = S ∪ T` keeps the cheaper of its current plan and `S ⋈ T`.
//! 3. **Finish**: the entry for the full relation set is the chosen plan.
//!
//! Because `T` is drawn from relations adjacent to `S`, every combination the
//! search forms is connected by at least one join edge: no cross product is
//! ever generated while a connected alternative exists.
//!
//! ## Ordering
//!
//! Levels are completed strictly by size, so by the time a size-`k` entry is
//! built every entry it can be built from is final. Within a level, entries
//! are visited in discovery order and neighbor subsets in ascending bitmask
//! order; a plan only replaces another if it is strictly cheaper. Two runs over
//! the same input therefore select bit-identical plans.
//!
//! ## Disconnected Graphs
//!
//! If growth never reaches the full set, the graph has several connected
//! components. With `allow_cross_products` the cheapest pair of component plans
//! is joined by a cross product until one plan remains; otherwise the search
//! reports `NoConnectedCompletion`.
//!
//! ## Termination
//!
//! The state space is at most `2^N - 1` entries. Passes over more than
//! `max_relations` relations are refused up front with `SearchInfeasible` so
//! the caller can switch to a heuristic planner.

use crate::cost::{CostModel, Estimate};
use crate::error::{JoinOrderError, Result};
use crate::join_graph::JoinGraph;
use crate::neighbor::{NeighborSubsets, MAX_NEIGHBORS};
use crate::plan::{JoinTree, OptimizedPlan};
use crate::relation_set::{RelationId, RelationSet, RelationSetManager};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Hard ceiling on `max_relations`: neighbor subsets are enumerated with a 64-bit mask.
pub const MAX_SEARCH_RELATIONS: usize = MAX_NEIGHBORS + 1;

/// Configuration knobs for the join order search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Largest relation count searched exhaustively. Clamped to
    /// [`MAX_SEARCH_RELATIONS`].
    pub max_relations: usize,
    /// Whether disconnected components may be joined by cross products when no
    /// connected plan covers every relation.
    pub allow_cross_products: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_relations: 12,
            allow_cross_products: false,
        }
    }
}

impl SearchConfig {
    /// The relation count above which `optimize` refuses to search.
    pub fn relation_limit(&self) -> usize {
        self.max_relations.min(MAX_SEARCH_RELATIONS)
    }
}

/// How a table entry's plan is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinPlan {
    /// Read one base relation.
    Scan(RelationId),
    /// Join the entries of two disjoint sets whose union is this entry's set.
    Join {
        left: RelationSet,
        right: RelationSet,
        /// No join edge crosses `left` and `right`.
        cross_product: bool,
    },
}

/// Best plan found so far for exactly one relation set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DpEntry {
    pub plan: JoinPlan,
    pub estimate: Estimate,
}

/// Outcome of offering a plan to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// The set had no entry; the plan is now its entry.
    Inserted,
    /// The plan was strictly cheaper and replaced the entry.
    Improved,
    /// The existing entry was at least as cheap.
    Kept,
}

/// Best-plan table keyed by canonical relation set.
#[derive(Debug, Default)]
pub struct DpTable {
    entries: HashMap<RelationSet, DpEntry>,
    /// `levels[k - 1]` lists the size-`k` sets in the order they were first reached.
    levels: Vec<Vec<RelationSet>>,
}

impl DpTable {
    pub fn new(relation_count: usize) -> Self {
        Self {
            entries: HashMap::new(),
            levels: vec![Vec::new(); relation_count],
        }
    }

    pub fn get(&self, set: RelationSet) -> Option<&DpEntry> {
        self.entries.get(&set)
    }

    pub fn contains(&self, set: RelationSet) -> bool {
        self.entries.contains_key(&set)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sets of `size` relations, in discovery order.
    pub fn level(&self, size: usize) -> &[RelationSet] {
        match size.checked_sub(1).and_then(|i| self.levels.get(i)) {
            Some(level) => level.as_slice(),
            None => &[],
        }
    }

    /// All entries, smallest sets first.
    pub fn iter(&self) -> impl Iterator<Item = (RelationSet, &DpEntry)> + '_ {
        self.levels
            .iter()
            .flatten()
            .map(move |set| (*set, &self.entries[set]))
    }

    /// Insert the entry if the set has none, otherwise replace it if strictly cheaper.
    pub fn offer(&mut self, set: RelationSet, size: usize, entry: DpEntry) -> Offer {
        match self.entries.get_mut(&set) {
            Some(current) => {
                if entry.estimate.cost.total < current.estimate.cost.total {
                    *current = entry;
                    Offer::Improved
                } else {
                    Offer::Kept
                }
            }
            None => {
                self.entries.insert(set, entry);
                self.levels[size - 1].push(set);
                Offer::Inserted
            }
        }
    }
}

/// One join order optimization pass.
///
/// Owns the relation set manager and the DP table for the pass; shares the
/// join graph and cost model with the caller. Every call to
/// [`optimize`](Self::optimize) starts from an empty manager and table.
pub struct DpSearch {
    /// Canonical relation sets created during the pass.
    pub manager: RelationSetManager,
    /// Best plan per connected relation set.
    pub table: DpTable,
    /// Relations and join predicates being ordered.
    pub graph: Arc<dyn JoinGraph>,
    /// Scores scans and joins.
    pub cost_model: Arc<dyn CostModel>,
    /// Size limit and cross-product policy.
    pub config: SearchConfig,
    /// Members and neighbors of every set already used as a left side. A set is
    /// extended at several levels; its neighbor list is computed once.
    frontiers: HashMap<RelationSet, Frontier>,
    /// Join candidates costed so far (shared across all levels).
    pairs_considered: usize,
}

#[derive(Debug, Clone)]
struct Frontier {
    members: Vec<RelationId>,
    neighbors: Vec<RelationId>,
}

impl DpSearch {
    pub fn new(
        graph: Arc<dyn JoinGraph>,
        cost_model: Arc<dyn CostModel>,
        config: SearchConfig,
    ) -> Self {
        let relation_count = graph.relation_count();
        Self {
            manager: RelationSetManager::new(relation_count),
            table: DpTable::new(relation_count),
            graph,
            cost_model,
            config,
            frontiers: HashMap::new(),
            pairs_considered: 0,
        }
    }

    pub fn pairs_considered(&self) -> usize {
        self.pairs_considered
    }

    /// Find the cheapest join order over all relations of the graph.
    ///
    /// `base_cardinalities[r]` is the estimated row count of relation `r`.
    pub fn optimize(&mut self, base_cardinalities: &[f64]) -> Result<OptimizedPlan> {
        let relation_count = self.graph.relation_count();
        if base_cardinalities.len() != relation_count {
            return Err(JoinOrderError::CardinalityMismatch {
                expected: relation_count,
                actual: base_cardinalities.len(),
            });
        }
        let limit = self.config.relation_limit();
        if relation_count > limit {
            debug!(
                "Refusing exhaustive join order search over {} relations (limit {})",
                relation_count, limit
            );
            return Err(JoinOrderError::SearchInfeasible {
                relations: relation_count,
                limit,
            });
        }

        self.manager = RelationSetManager::new(relation_count);
        self.table = DpTable::new(relation_count);
        self.frontiers.clear();
        self.pairs_considered = 0;

        if relation_count == 0 {
            return Ok(OptimizedPlan::empty());
        }

        debug!("Starting join order search: relations={}", relation_count);

        self.seed(base_cardinalities);
        for size in 2..=relation_count {
            let inserted = self.grow_level(size);
            trace!("Level {}: {} new entries", size, inserted);
            if inserted == 0 {
                // Every connected set of size k+1 contains a connected set of size k.
                break;
            }
        }

        let all: Vec<RelationId> = (0..relation_count).collect();
        let full = self.manager.relation_from_sorted(&all);
        let root = if self.table.contains(full) {
            full
        } else {
            let components = self.connected_components();
            if !self.config.allow_cross_products {
                debug!(
                    "Join graph has {} components and cross products are disabled",
                    components.len()
                );
                return Err(JoinOrderError::NoConnectedCompletion {
                    components: components.len(),
                });
            }
            self.join_components(components)
        };

        let entry = *self.entry(root);
        let plan = OptimizedPlan {
            tree: Some(self.extract_tree(root)),
            cost: entry.estimate.cost,
            cardinality: entry.estimate.cardinality,
            table_entries: self.table.len(),
        };

        debug!(
            "Join order search complete: cost={:.1}, entries={}, pairs={}",
            plan.cost.total,
            plan.table_entries,
            self.pairs_considered
        );
        Ok(plan)
    }

    /// Expand the table entry for `set` into a join tree.
    ///
    /// # Panics
    ///
    /// Panics if `set` or any set its plan refers to has no entry.
    pub fn extract_tree(&self, set: RelationSet) -> JoinTree {
        let entry = self.entry(set);
        match entry.plan {
            JoinPlan::Scan(relation) => JoinTree::Leaf {
                relation,
                cardinality: entry.estimate.cardinality,
            },
            JoinPlan::Join {
                left,
                right,
                cross_product,
            } => JoinTree::Join {
                left: Box::new(self.extract_tree(left)),
                right: Box::new(self.extract_tree(right)),
                cardinality: entry.estimate.cardinality,
                cost: entry.estimate.cost.total,
                cross_product,
            },
        }
    }

    fn entry(&self, set: RelationSet) -> &DpEntry {
        self.table.get(set).unwrap_or_else(|| {
            panic!(
                "no join order table entry for relation set {}",
                self.manager.display(set)
            )
        })
    }

    fn seed(&mut self, base_cardinalities: &[f64]) {
        for (relation, &cardinality) in base_cardinalities.iter().enumerate() {
            let set = self.manager.relation(relation);
            let estimate = self.cost_model.scan_estimate(relation, cardinality);
            self.table.offer(
                set,
                1,
                DpEntry {
                    plan: JoinPlan::Scan(relation),
                    estimate,
                },
            );
        }
    }

    /// Build every reachable entry of `size` relations. Returns how many were created.
    fn grow_level(&mut self, size: usize) -> usize {
        let mut inserted = 0;

        for left_size in 1..size {
            let right_size = size - left_size;
            // Snapshot: entries of `left_size` are final, but the table is
            // mutated while the level is built.
            let lefts = self.table.level(left_size).to_vec();

            for left in lefts {
                let frontier = self.take_frontier(left);

                for subset in NeighborSubsets::with_size(&frontier.neighbors, right_size) {
                    let right = self.manager.relation_from_sorted(&subset);
                    if right_size > 1 && !self.table.contains(right) {
                        continue;
                    }
                    let Some(selectivity) = self.graph.edge_cost(&frontier.members, &subset)
                    else {
                        continue;
                    };
                    let (_, offer) = self.combine(left, right, selectivity, false);
                    if offer == Offer::Inserted {
                        inserted += 1;
                    }
                }

                self.frontiers.insert(left, frontier);
            }
        }

        inserted
    }

    /// Cached members and neighbors of `set`, removed from the cache while the
    /// caller mutates the manager. Put it back when done.
    fn take_frontier(&mut self, set: RelationSet) -> Frontier {
        if let Some(frontier) = self.frontiers.remove(&set) {
            return frontier;
        }
        let members = self.manager.members(set).to_vec();
        let neighbors = self.graph.neighbors(&members);
        Frontier { members, neighbors }
    }

    /// Cost `left ⋈ right` and offer it to the table entry of their union.
    fn combine(
        &mut self,
        left: RelationSet,
        right: RelationSet,
        selectivity: f64,
        cross_product: bool,
    ) -> (RelationSet, Offer) {
        let left_estimate = self.entry(left).estimate;
        let right_estimate = self.entry(right).estimate;
        let estimate = self
            .cost_model
            .join_estimate(&left_estimate, &right_estimate, selectivity);

        let union = self.manager.union(left, right);
        let size = self.manager.size(union);
        self.pairs_considered += 1;

        let offer = self.table.offer(
            union,
            size,
            DpEntry {
                plan: JoinPlan::Join {
                    left,
                    right,
                    cross_product,
                },
                estimate,
            },
        );
        if offer != Offer::Kept {
            trace!(
                "  New best for {} = {} x {}: cost={:.1}",
                self.manager.display(union),
                self.manager.display(left),
                self.manager.display(right),
                estimate.cost.total
            );
        }
        (union, offer)
    }

    /// Maximal connected relation sets, ordered by their smallest member.
    fn connected_components(&mut self) -> Vec<RelationSet> {
        let relation_count = self.graph.relation_count();
        let mut covered = vec![false; relation_count];
        let mut components = Vec::new();

        for relation in 0..relation_count {
            if covered[relation] {
                continue;
            }
            let mut component = self.manager.relation(relation);
            loop {
                let neighbors = self.graph.neighbors(self.manager.members(component));
                if neighbors.is_empty() {
                    break;
                }
                let frontier = self.manager.relation_from_sorted(&neighbors);
                component = self.manager.union(component, frontier);
            }
            for &member in self.manager.members(component) {
                covered[member] = true;
            }
            components.push(component);
        }

        components
    }

    /// Join component plans pairwise by cross products, cheapest pair first.
    fn join_components(&mut self, mut parts: Vec<RelationSet>) -> RelationSet {
        debug!("Joining {} components with cross products", parts.len());

        while parts.len() > 1 {
            let mut best: Option<(OrderedFloat<f64>, usize, usize)> = None;
            for i in 0..parts.len() {
                for j in (i + 1)..parts.len() {
                    let estimate = self.cost_model.join_estimate(
                        &self.entry(parts[i]).estimate,
                        &self.entry(parts[j]).estimate,
                        1.0,
                    );
                    let cost = OrderedFloat(estimate.cost.total);
                    if best.map_or(true, |(lowest, _, _)| cost < lowest) {
                        best = Some((cost, i, j));
                    }
                }
            }

            let Some((_, i, j)) = best else { break };
            let (joined, _) = self.combine(parts[i], parts[j], 1.0, true);
            parts.remove(j);
            parts[i] = joined;
        }

        parts[0]
    }
}
