//! # HTTP Route Handlers
//!
//! Service-level endpoints. The join-graph optimization endpoint lives in
//! `join_graph.rs`.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::state::{AppState, OptimizerConfig};

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

/// GET /config: the active optimizer configuration.
pub async fn config(State(state): State<Arc<AppState>>) -> Json<OptimizerConfig> {
    Json(state.config.clone())
}
