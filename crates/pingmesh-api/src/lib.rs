//! pingmesh-api — HTTP interface of the pingmesh collector.
//!
//! Provides axum route handlers for report ingestion and status queries,
//! Prometheus exposition, and optional static file serving for a web UI.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/status` | Ingest a node status report |
//! | GET | `/api/nodes` | Latest report per node |
//! | GET | `/api/history?node=&start=&end=` | Retained history for a node |
//! | GET | `/metrics` | Prometheus exposition |
//! | GET | `/*` | Static files from the web root, if configured |

pub mod handlers;
pub mod prometheus;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use pingmesh_state::StatusStore;

/// Largest accepted report body.
pub const MAX_REPORT_BYTES: usize = 1 << 20;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StatusStore,
    /// Directory served for paths outside `/api` and `/metrics`.
    pub web_root: Option<Arc<PathBuf>>,
}

/// Build the collector router (API + metrics + optional static files).
pub fn build_router(store: StatusStore, web_root: Option<PathBuf>) -> Router {
    let serve_static = web_root.is_some();
    let api_state = ApiState {
        store,
        web_root: web_root.map(Arc::new),
    };

    let api_routes = Router::new()
        .route("/status", post(handlers::ingest_status))
        .route("/nodes", get(handlers::list_nodes))
        .route("/history", get(handlers::get_history))
        .layer(DefaultBodyLimit::max(MAX_REPORT_BYTES))
        .with_state(api_state.clone());

    let mut router = Router::new()
        .nest("/api", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(api_state.clone()));

    if serve_static {
        router = router.fallback_service(get(handlers::static_file).with_state(api_state));
    }

    router.layer(TraceLayer::new_for_http())
}
