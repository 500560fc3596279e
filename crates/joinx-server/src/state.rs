//! # Application State
//!
//! Shared state available to every HTTP request handler. It is created once at
//! server startup and shared via `Arc` across concurrent requests. Nothing in
//! it belongs to a single optimization pass: each request builds its own
//! `DpSearch`, which owns the relation sets and DP table for that request only.
//!
//! ## Components
//!
//! - **Cost Model**: estimates join cardinalities and costs. Shared because it
//!   is stateless.
//! - **Optimizer Config**: listen address and search limits, read from the
//!   environment at startup.

use joinx_core::cost::{CostModel, DefaultCostModel};
use joinx_core::search::SearchConfig;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Server-level optimizer configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizerConfig {
    /// Socket address the HTTP listener binds to.
    pub listen_addr: String,
    /// Largest join graph searched exhaustively.
    pub max_relations: usize,
    /// Default cross-product policy; requests may override it.
    pub allow_cross_products: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            max_relations: SearchConfig::default().max_relations,
            allow_cross_products: true,
        }
    }
}

impl OptimizerConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `JOINX_LISTEN_ADDR`: socket address to bind
    /// - `JOINX_MAX_RELATIONS`: exhaustive search limit
    /// - `JOINX_ALLOW_CROSS_PRODUCTS`: `true`/`false`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(s) = lookup("JOINX_LISTEN_ADDR") {
            cfg.listen_addr = s;
        }

        if let Some(s) = lookup("JOINX_MAX_RELATIONS") {
            match s.parse::<usize>() {
                Ok(v) => cfg.max_relations = v,
                Err(_) => warn!("Ignoring invalid JOINX_MAX_RELATIONS={:?}", s),
            }
        }

        if let Some(s) = lookup("JOINX_ALLOW_CROSS_PRODUCTS") {
            match s.parse::<bool>() {
                Ok(v) => cfg.allow_cross_products = v,
                Err(_) => warn!("Ignoring invalid JOINX_ALLOW_CROSS_PRODUCTS={:?}", s),
            }
        }

        cfg
    }

    /// Search configuration for one request.
    pub fn search_config(&self, allow_cross_products: Option<bool>) -> SearchConfig {
        SearchConfig {
            max_relations: self.max_relations,
            allow_cross_products: allow_cross_products.unwrap_or(self.allow_cross_products),
        }
    }
}

/// Shared application state, accessible by all request handlers via Axum's State extractor.
pub struct AppState {
    /// The cost model used to score join orders.
    pub cost_model: Arc<dyn CostModel>,
    pub config: OptimizerConfig,
}

impl AppState {
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            cost_model: Arc::new(DefaultCostModel::default()),
            config,
        }
    }
}
