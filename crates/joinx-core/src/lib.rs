//! # joinx-core: Join Order Search
//!
//! This crate implements the join-order search at the heart of a cost-based
//! query optimizer. Given base relations, the join predicates between them, and
//! an external cost model, it finds a cheap binary join tree by dynamic
//! programming over connected relation subsets, never forming a cross product
//! while a connected alternative exists.
//!
//! ## Module Overview
//!
//! - **`relation_set`**: Canonical (interned) relation sets with union and
//!   subset tests, backed by an arena-indexed prefix tree.
//! - **`neighbor`**: Deterministic enumeration of the non-empty subsets of a
//!   neighbor list.
//! - **`join_graph`**: The `JoinGraph` trait consumed by the search and an
//!   in-memory adjacency implementation.
//! - **`cost`**: Cost model trait and the default intermediate-result-size model.
//! - **`search`**: The DP driver, its table, and its configuration.
//! - **`plan`**: Join tree output handed to the plan emitter.
//! - **`error`**: Recoverable planning errors.

pub mod cost;
pub mod error;
pub mod join_graph;
pub mod neighbor;
pub mod plan;
pub mod relation_set;
pub mod search;

pub use error::{JoinOrderError, Result};
