//! # joinx-server: HTTP Service for Join Order Search
//!
//! This binary exposes the DP join order search as a network service. A query
//! coordinator sends the join graph of a query (tables with row counts and
//! column NDVs, plus equi-join edges) and receives the chosen join tree.
//!
//! ## Architecture
//!
//! ```text
//! Query coordinator
//!   |
//!   | HTTP POST /optimize/join-graph (JSON)
//!   v
//! joinx-server (this binary)
//!   |
//!   +-> derive edge selectivities from NDVs
//!   +-> DP search over connected subsets (joinx-core)
//!   +-> map the join tree back to table ids and join columns
//!   |
//!   | HTTP response (JSON join tree)
//!   v
//! Query coordinator
//! ```
//!
//! ## Endpoints
//!
//! - `GET  /health`               - Health check
//! - `GET  /config`               - Active search configuration
//! - `POST /optimize/join-graph`  - Optimize join ordering for a join graph
//!
//! ## Configuration
//!
//! The listen address and search limits come from `JOINX_*` environment
//! variables (see `OptimizerConfig::from_env`). Logging is controlled by the
//! `RUST_LOG` environment variable (defaults to `joinx=debug`).

mod join_graph;
mod routes;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

fn app(state: Arc<state::AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/config", get(routes::config))
        .route("/optimize/join-graph", post(join_graph::optimize_join_graph))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("joinx=debug".parse()?))
        .init();

    let config = state::OptimizerConfig::from_env();
    let listen_addr = config.listen_addr.clone();
    let state = Arc::new(state::AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!("joinx-server listening on http://{}", listen_addr);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
