//! # Cost Model
//!
//! The join order search compares plans but never decides what a plan costs:
//! that is the job of a `CostModel` supplied by the surrounding engine. The
//! search hands it two already-estimated inputs plus the selectivity the join
//! graph reports for the edges between them, and stores whatever comes back.
//!
//! ## Default Model (C_out)
//!
//! `DefaultCostModel` charges each join the cardinality of its output, so the
//! total cost of a tree is the sum of all intermediate result sizes:
//!
//! ```text
//! |L JOIN R| = |L| * |R| * selectivity
//! cost(L JOIN R) = cost(L) + cost(R) + output_weight * |L JOIN R|
//! ```
//!
//! Output cardinality depends only on which relations are joined, not on the
//! order, so the cheapest plan for a set stays the cheapest once the set is
//! joined further. Scans cost `scan_weight * rows`, which defaults to zero so a
//! single relation has no join cost.

use crate::relation_set::RelationId;
use serde::{Deserialize, Serialize};

/// Cost is a single comparable value representing the estimated expense of a plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cost {
    /// The total cost. Lower is better.
    pub total: f64,
}

impl Cost {
    pub fn zero() -> Self {
        Self { total: 0.0 }
    }

    pub fn new(total: f64) -> Self {
        Self { total }
    }
}

/// Epsilon-based equality to handle floating-point imprecision in cost comparisons.
impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        (self.total - other.total).abs() < f64::EPSILON
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.total.partial_cmp(&other.total)
    }
}

/// Estimated output size and accumulated cost of a (partial) plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// Estimated output rows.
    pub cardinality: f64,
    /// Accumulated cost, including the inputs' costs.
    pub cost: Cost,
}

impl Estimate {
    pub fn new(cardinality: f64, cost: Cost) -> Self {
        Self { cardinality, cost }
    }
}

/// Trait for pluggable cost models.
pub trait CostModel: Send + Sync {
    /// Estimate for scanning one base relation with the given cardinality.
    fn scan_estimate(&self, relation: RelationId, cardinality: f64) -> Estimate;

    /// Estimate for joining two inputs. `selectivity` is `1.0` for a cross product.
    fn join_estimate(&self, left: &Estimate, right: &Estimate, selectivity: f64) -> Estimate;
}

/// Intermediate-result-size model.
#[derive(Debug, Clone)]
pub struct DefaultCostModel {
    /// Cost per base-relation row read.
    pub scan_weight: f64,
    /// Cost per join output row.
    pub output_weight: f64,
}

impl Default for DefaultCostModel {
    fn default() -> Self {
        Self {
            scan_weight: 0.0,
            output_weight: 1.0,
        }
    }
}

impl CostModel for DefaultCostModel {
    fn scan_estimate(&self, _relation: RelationId, cardinality: f64) -> Estimate {
        Estimate::new(cardinality, Cost::new(self.scan_weight * cardinality))
    }

    fn join_estimate(&self, left: &Estimate, right: &Estimate, selectivity: f64) -> Estimate {
        let cardinality = left.cardinality * right.cardinality * selectivity;
        let total = left.cost.total + right.cost.total + self.output_weight * cardinality;
        Estimate::new(cardinality, Cost::new(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scans_are_free_by_default() {
        let model = DefaultCostModel::default();
        let scan = model.scan_estimate(0, 1_000.0);
        assert_eq!(scan.cardinality, 1_000.0);
        assert_eq!(scan.cost, Cost::zero());
    }

    #[test]
    fn test_join_cost_accumulates_intermediate_sizes() {
        let model = DefaultCostModel::default();
        let orders = model.scan_estimate(0, 1_500_000.0);
        let customer = model.scan_estimate(1, 150_000.0);
        let nation = model.scan_estimate(2, 25.0);

        let oc = model.join_estimate(&orders, &customer, 1.0 / 150_000.0);
        assert!((oc.cardinality - 1_500_000.0).abs() < 1e-6);
        assert!((oc.cost.total - 1_500_000.0).abs() < 1e-6);

        let ocn = model.join_estimate(&oc, &nation, 1.0 / 25.0);
        assert!((ocn.cost.total - 3_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_selective_join_is_cheaper() {
        let model = DefaultCostModel::default();
        let a = model.scan_estimate(0, 10_000.0);
        let b = model.scan_estimate(1, 10_000.0);
        let selective = model.join_estimate(&a, &b, 0.0001);
        let cross = model.join_estimate(&a, &b, 1.0);
        assert!(selective.cost < cross.cost);
    }
}
