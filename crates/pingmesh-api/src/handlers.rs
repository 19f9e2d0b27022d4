//! Collector API handlers.
//!
//! Query responses are plain JSON bodies; errors use a small JSON
//! envelope `{ "success": false, "error": "..." }`.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::{debug, warn};

use pingmesh_state::{NodeAddr, ReportPayload, StatusError, TimeRange};

use crate::ApiState;

/// Paths never served from the web root.
pub const SENSITIVE_PREFIXES: &[&str] = &["/server/", "/config/", "/.env"];

#[derive(serde::Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ErrorBody {
            success: false,
            error: msg.to_string(),
        }),
    )
        .into_response()
}

fn status_error_response(e: &StatusError) -> Response {
    let status = match e {
        StatusError::MalformedInput(_) => StatusCode::BAD_REQUEST,
        StatusError::NotFound(_) => StatusCode::NOT_FOUND,
    };
    error_response(&e.to_string(), status)
}

// ── Ingestion ──────────────────────────────────────────────────

/// POST /api/status
pub async fn ingest_status(
    State(state): State<ApiState>,
    payload: Result<Json<ReportPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "undecodable status report");
            return error_response("invalid JSON format", StatusCode::BAD_REQUEST);
        }
    };

    let node_ip = payload.node_ip.clone();
    match state.store.ingest(payload).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            warn!(%node_ip, error = %e, "status report rejected");
            status_error_response(&e)
        }
    }
}

// ── Queries ────────────────────────────────────────────────────

/// GET /api/nodes
pub async fn list_nodes(State(state): State<ApiState>) -> Response {
    Json(state.store.snapshot().await).into_response()
}

/// History query parameters. Time bounds are RFC3339.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub node: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// GET /api/history?node=&start=&end=
///
/// Unparsable `start`/`end` values are ignored rather than rejected.
pub async fn get_history(State(state): State<ApiState>, Query(params): Query<HistoryParams>) -> Response {
    let Some(node) = params.node.as_deref().filter(|n| !n.is_empty()) else {
        return error_response("node parameter is required", StatusCode::BAD_REQUEST);
    };

    // An address that does not parse can never have reported.
    let Ok(node) = node.parse::<NodeAddr>() else {
        return error_response("node not found", StatusCode::NOT_FOUND);
    };

    let range = TimeRange::parse_lenient(params.start.as_deref(), params.end.as_deref());
    match state.store.history(&node, &range).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => status_error_response(&e),
    }
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> Response {
    let (stats, snapshot) = state.store.stats_and_snapshot().await;
    let body = crate::prometheus::render_prometheus(&stats, &snapshot);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

// ── Static files ───────────────────────────────────────────────

/// Whether `path` falls under a directory that must not be served.
///
/// The check runs on the path as `ServeDir` resolves it: percent-decoded,
/// with empty and `.` segments dropped.
pub fn is_sensitive_path(path: &str) -> bool {
    let normalized = normalize_path(path);
    let as_dir = format!("{normalized}/");
    SENSITIVE_PREFIXES
        .iter()
        .any(|prefix| normalized.starts_with(prefix) || as_dir.starts_with(prefix))
}

fn normalize_path(path: &str) -> String {
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    let segments: Vec<&str> = decoded
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect();
    format!("/{}", segments.join("/"))
}

/// Fallback: serve files from the configured web root.
pub async fn static_file(State(state): State<ApiState>, req: Request) -> Response {
    if is_sensitive_path(req.uri().path()) {
        return error_response("forbidden", StatusCode::FORBIDDEN);
    }
    let Some(root) = state.web_root.as_deref() else {
        return error_response("not found", StatusCode::NOT_FOUND);
    };

    match ServeDir::new(root).oneshot(req).await {
        Ok(resp) => resp.into_response(),
        Err(never) => match never {},
    }
}
