//! End-to-end join ordering tests using TPC-H and TPC-DS join graphs.
//!
//! Each test builds the join graph of a benchmark query with SF=1 row counts
//! and equi-join selectivities of `1 / max(NDV)`, runs the DP search, and
//! compares the result against the left-deep plan in query-text order (the
//! "naive" plan).
//!
//! ## Queries
//! - TPC-H Q2:  5-table chain (part - partsupp - supplier - nation - region)
//! - TPC-H Q5:  6-table cycle (customer, orders, lineitem, supplier, nation, region)
//! - TPC-H Q8:  8-table snowflake (lineitem hub, customer/supplier branches)
//! - TPC-DS Q7: 5-table star (store_sales fact + 4 dimensions)
//!
//! ## What These Tests Verify
//! - The DP table holds exactly the connected subsets of the graph
//! - Connected graphs are never joined through a cross product
//! - The chosen plan is never more expensive than the naive order
//! - Repeated runs pick identical plans
//! - Disconnected graphs follow the configured cross-product policy

use joinx_core::cost::{CostModel, DefaultCostModel, Estimate};
use joinx_core::join_graph::{InMemoryJoinGraph, JoinEdge, JoinGraph};
use joinx_core::plan::{JoinTree, OptimizedPlan};
use joinx_core::search::{DpSearch, SearchConfig};
use joinx_core::{JoinOrderError, Result};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Query {
    names: Vec<&'static str>,
    rows: Vec<f64>,
    edges: Vec<JoinEdge>,
}

impl Query {
    fn table(&mut self, name: &'static str, rows: f64) -> usize {
        self.names.push(name);
        self.rows.push(rows);
        self.names.len() - 1
    }

    /// Equi-join between two tables on keys with the given NDVs.
    fn equi(&mut self, left: usize, right: usize, left_ndv: f64, right_ndv: f64) {
        let selectivity = 1.0 / left_ndv.max(right_ndv).max(1.0);
        self.edges.push(JoinEdge::new(left, right, selectivity));
    }

    fn graph(&self) -> InMemoryJoinGraph {
        InMemoryJoinGraph::with_edges(self.rows.len(), self.edges.iter().copied())
            .expect("benchmark graphs are valid")
    }

    fn optimize(&self, config: SearchConfig) -> (Result<OptimizedPlan>, DpSearch) {
        let mut search = DpSearch::new(
            Arc::new(self.graph()),
            Arc::new(DefaultCostModel::default()),
            config,
        );
        let plan = search.optimize(&self.rows);
        (plan, search)
    }

    /// Cost of the left-deep plan joining tables in `order`.
    fn left_deep_cost(&self, order: &[usize]) -> f64 {
        let graph = self.graph();
        let model = DefaultCostModel::default();
        let mut joined = vec![order[0]];
        let mut acc: Estimate = model.scan_estimate(order[0], self.rows[order[0]]);

        for &next in &order[1..] {
            joined.sort_unstable();
            let selectivity = graph.edge_cost(&joined, &[next]).unwrap_or(1.0);
            let scan = model.scan_estimate(next, self.rows[next]);
            acc = model.join_estimate(&acc, &scan, selectivity);
            joined.push(next);
        }
        acc.cost.total
    }

    fn render(&self, tree: &JoinTree) -> String {
        match tree {
            JoinTree::Leaf { relation, .. } => self.names[*relation].to_string(),
            JoinTree::Join { left, right, .. } => {
                format!("({} ⋈ {})", self.render(left), self.render(right))
            }
        }
    }
}

fn assert_not_worse(dp_cost: f64, naive_cost: f64) {
    assert!(
        dp_cost <= naive_cost * (1.0 + 1e-9),
        "DP plan ({dp_cost:.1}) should not be more expensive than the naive plan ({naive_cost:.1})"
    );
}

// ===========================================================================
// TPC-H Q2: 5-table chain  part - partsupp - supplier - nation - region
// ===========================================================================

fn tpch_q2() -> Query {
    let mut q = Query::default();
    let part = q.table("part", 200_000.0);
    let partsupp = q.table("partsupp", 800_000.0);
    let supplier = q.table("supplier", 10_000.0);
    let nation = q.table("nation", 25.0);
    let region = q.table("region", 5.0);

    q.equi(part, partsupp, 200_000.0, 200_000.0);
    q.equi(partsupp, supplier, 10_000.0, 10_000.0);
    q.equi(supplier, nation, 25.0, 25.0);
    q.equi(nation, region, 5.0, 5.0);
    q
}

#[test]
fn test_tpch_q2_chain_join() {
    let q = tpch_q2();
    let (plan, _) = q.optimize(SearchConfig::default());
    let plan = plan.expect("chain is connected");
    let tree = plan.tree.as_ref().expect("non-empty query");

    println!("=== TPC-H Q2 (5-table chain) ===");
    println!("{}", tree.display(0));
    println!("Order: {}", q.render(tree));

    // A chain of n relations has n(n+1)/2 connected subsets (its intervals).
    assert_eq!(plan.table_entries, 15);
    assert_eq!(tree.relations(), vec![0, 1, 2, 3, 4]);
    assert_eq!(tree.cross_product_count(), 0);
    assert_not_worse(plan.cost.total, q.left_deep_cost(&[0, 1, 2, 3, 4]));
}

// ===========================================================================
// TPC-H Q5: 6 tables with the customer-orders-lineitem-supplier-nation cycle
// ===========================================================================

fn tpch_q5() -> Query {
    let mut q = Query::default();
    let customer = q.table("customer", 150_000.0);
    let orders = q.table("orders", 1_500_000.0);
    let lineitem = q.table("lineitem", 6_000_000.0);
    let supplier = q.table("supplier", 10_000.0);
    let nation = q.table("nation", 25.0);
    let region = q.table("region", 5.0);

    q.equi(customer, orders, 150_000.0, 100_000.0);
    q.equi(orders, lineitem, 1_500_000.0, 1_500_000.0);
    q.equi(lineitem, supplier, 10_000.0, 10_000.0);
    q.equi(customer, nation, 25.0, 25.0);
    q.equi(supplier, nation, 25.0, 25.0);
    q.equi(nation, region, 25.0, 5.0);
    q
}

#[test]
fn test_tpch_q5_beats_query_text_order() {
    let q = tpch_q5();
    let (plan, _) = q.optimize(SearchConfig::default());
    let plan = plan.expect("Q5 is connected");
    let tree = plan.tree.as_ref().expect("non-empty query");

    println!("=== TPC-H Q5 ===");
    println!("{}", tree.display(0));

    let naive = q.left_deep_cost(&[0, 1, 2, 3, 4, 5]);
    println!("DP cost: {:.1}, naive cost: {:.1}", plan.cost.total, naive);

    assert_eq!(tree.cross_product_count(), 0);
    assert_eq!(tree.join_count(), 5);
    assert!(
        plan.cost.total < naive,
        "joining the small dimension branch first should beat query-text order"
    );
}

#[test]
fn test_tpch_q5_is_deterministic() {
    let q = tpch_q5();
    let (first, first_search) = q.optimize(SearchConfig::default());
    let (second, second_search) = q.optimize(SearchConfig::default());
    let first = first.expect("plan");
    let second = second.expect("plan");

    assert_eq!(first, second);
    assert_eq!(first.cost.total.to_bits(), second.cost.total.to_bits());
    assert_eq!(first_search.pairs_considered(), second_search.pairs_considered());
}

#[test]
fn test_search_object_can_be_reused() {
    let q = tpch_q5();
    let mut search = DpSearch::new(
        Arc::new(q.graph()),
        Arc::new(DefaultCostModel::default()),
        SearchConfig::default(),
    );
    let first = search.optimize(&q.rows).expect("plan");
    let second = search.optimize(&q.rows).expect("plan");
    assert_eq!(first, second);
}

// ===========================================================================
// TPC-H Q8: 8-table snowflake
// part, supplier, lineitem, orders, customer, n1, n2, region
// ===========================================================================

#[test]
fn test_tpch_q8_snowflake() {
    let mut q = Query::default();
    let part = q.table("part", 200_000.0);
    let supplier = q.table("supplier", 10_000.0);
    let lineitem = q.table("lineitem", 6_000_000.0);
    let orders = q.table("orders", 1_500_000.0);
    let customer = q.table("customer", 150_000.0);
    let n1 = q.table("n1", 25.0);
    let n2 = q.table("n2", 25.0);
    let region = q.table("region", 5.0);

    q.equi(part, lineitem, 200_000.0, 200_000.0);
    q.equi(supplier, lineitem, 10_000.0, 10_000.0);
    q.equi(lineitem, orders, 1_500_000.0, 1_500_000.0);
    q.equi(orders, customer, 100_000.0, 150_000.0);
    q.equi(customer, n1, 25.0, 25.0);
    q.equi(n1, region, 5.0, 5.0);
    q.equi(supplier, n2, 25.0, 25.0);

    let (plan, search) = q.optimize(SearchConfig::default());
    let plan = plan.expect("Q8 is connected");
    let tree = plan.tree.as_ref().expect("non-empty query");

    println!("=== TPC-H Q8 (8-table snowflake) ===");
    println!("Order: {}", q.render(tree));
    println!("Entries: {}, pairs: {}", plan.table_entries, search.pairs_considered());

    assert_eq!(tree.relations(), (0..8).collect::<Vec<_>>());
    assert_eq!(tree.cross_product_count(), 0);
    assert!(plan.table_entries < (1 << 8) - 1);
    assert_not_worse(plan.cost.total, q.left_deep_cost(&[0, 2, 1, 3, 4, 5, 6, 7]));
}

// ===========================================================================
// TPC-DS Q7: 5-table star (store_sales + 4 dimensions)
// ===========================================================================

#[test]
fn test_tpcds_q7_star() {
    let mut q = Query::default();
    let store_sales = q.table("store_sales", 2_880_404.0);
    let demographics = q.table("customer_demographics", 1_920_800.0);
    let date_dim = q.table("date_dim", 73_049.0);
    let item = q.table("item", 18_000.0);
    let promotion = q.table("promotion", 300.0);

    q.equi(store_sales, demographics, 1_920_800.0, 1_920_800.0);
    q.equi(store_sales, date_dim, 1_823.0, 73_049.0);
    q.equi(store_sales, item, 18_000.0, 18_000.0);
    q.equi(store_sales, promotion, 300.0, 300.0);

    let (plan, search) = q.optimize(SearchConfig::default());
    let plan = plan.expect("star is connected");
    let tree = plan.tree.as_ref().expect("non-empty query");

    println!("=== TPC-DS Q7 (star) ===");
    println!("Order: {}", q.render(tree));

    // Connected subsets of a star: every subset containing the fact table
    // (2^4) plus the four dimension singletons.
    assert_eq!(plan.table_entries, 20);
    assert_eq!(search.table.iter().count(), 20);
    assert_eq!(tree.cross_product_count(), 0);
    // Dimensions only connect through the fact table, so the plan is left-deep.
    assert!(tree.is_left_deep());
    assert_not_worse(plan.cost.total, q.left_deep_cost(&[0, 1, 2, 3, 4]));
}

// ===========================================================================
// Cross-product policy and limits
// ===========================================================================

fn two_islands() -> Query {
    let mut q = Query::default();
    let a = q.table("a", 100.0);
    let b = q.table("b", 200.0);
    let c = q.table("c", 300.0);
    let d = q.table("d", 400.0);
    q.equi(a, b, 100.0, 100.0);
    q.equi(c, d, 300.0, 300.0);
    q
}

#[test]
fn test_disconnected_graph_fails_without_cross_products() {
    let (plan, _) = two_islands().optimize(SearchConfig::default());
    assert_eq!(plan, Err(JoinOrderError::NoConnectedCompletion { components: 2 }));
}

#[test]
fn test_disconnected_graph_uses_one_cross_product_when_allowed() {
    let q = two_islands();
    let config = SearchConfig {
        allow_cross_products: true,
        ..SearchConfig::default()
    };
    let (plan, _) = q.optimize(config);
    let plan = plan.expect("cross products allowed");
    let tree = plan.tree.expect("non-empty query");

    assert_eq!(tree.relations(), vec![0, 1, 2, 3]);
    assert_eq!(tree.cross_product_count(), 1);
    match &tree {
        JoinTree::Join {
            left,
            right,
            cross_product,
            ..
        } => {
            assert!(cross_product);
            assert_eq!(left.relations(), vec![0, 1]);
            assert_eq!(right.relations(), vec![2, 3]);
        }
        JoinTree::Leaf { .. } => panic!("expected a join at the root"),
    }
}

#[test]
fn test_isolated_relations_join_cheapest_pair_first() {
    let mut q = Query::default();
    q.table("a", 10.0);
    q.table("b", 1_000.0);
    q.table("c", 5.0);
    let config = SearchConfig {
        allow_cross_products: true,
        ..SearchConfig::default()
    };

    let (plan, _) = q.optimize(config);
    let plan = plan.expect("cross products allowed");
    let tree = plan.tree.expect("non-empty query");

    assert_eq!(q.render(&tree), "((a ⋈ c) ⋈ b)");
    assert_eq!(tree.cross_product_count(), 2);
    assert!((plan.cost.total - 50_050.0).abs() < 1e-9);
    assert!((plan.cardinality - 50_000.0).abs() < 1e-9);
}

#[test]
fn test_too_many_relations_is_infeasible() {
    let mut q = Query::default();
    for i in 0..13 {
        q.table("t", 1_000.0 + i as f64);
    }
    for i in 1..13 {
        q.equi(i - 1, i, 1_000.0, 1_000.0);
    }

    let (plan, _) = q.optimize(SearchConfig::default());
    assert_eq!(
        plan,
        Err(JoinOrderError::SearchInfeasible {
            relations: 13,
            limit: 12
        })
    );

    let config = SearchConfig {
        max_relations: 13,
        ..SearchConfig::default()
    };
    let (plan, _) = q.optimize(config);
    let plan = plan.expect("limit raised");
    assert_eq!(plan.table_entries, 13 * 14 / 2);
}

#[test]
fn test_larger_clique_fills_every_subset() {
    let mut q = Query::default();
    for i in 0..10 {
        q.table("t", 100.0 * (i + 1) as f64);
    }
    for i in 0..10 {
        for j in (i + 1)..10 {
            q.equi(i, j, 50.0, 50.0);
        }
    }

    let (plan, _) = q.optimize(SearchConfig::default());
    let plan = plan.expect("clique is connected");
    assert_eq!(plan.table_entries, (1 << 10) - 1);
    assert_eq!(plan.tree.map(|t| t.cross_product_count()), Some(0));
}
