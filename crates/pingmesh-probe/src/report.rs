//! Report submission to the collector over HTTP/1.1.

use std::time::Duration;

use bytes::Bytes;
use http::{StatusCode, Uri};
use http_body_util::Full;
use thiserror::Error;
use tracing::debug;

use pingmesh_state::ReportPayload;

/// Path of the collector's ingestion endpoint.
pub const STATUS_PATH: &str = "/api/status";

/// Errors that can occur while submitting a report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid server url {0:?}: expected http://host[:port]")]
    InvalidUrl(String),

    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("connection to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    #[error("failed to build request: {0}")]
    Request(#[from] http::Error),

    #[error("collector rejected report: {0}")]
    Rejected(StatusCode),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// POST a report to `{server_url}/api/status`.
///
/// Any 2xx response counts as accepted.
pub async fn submit(server_url: &str, report: &ReportPayload, timeout: Duration) -> Result<(), ReportError> {
    let (addr, host) = resolve_authority(server_url)?;
    let body = serde_json::to_vec(report)?;

    tokio::time::timeout(timeout, post_json(&addr, &host, Bytes::from(body)))
        .await
        .map_err(|_| ReportError::Timeout(timeout))?
}

async fn post_json(addr: &str, host: &str, body: Bytes) -> Result<(), ReportError> {
    let stream = tokio::net::TcpStream::connect(addr)
        .await
        .map_err(|source| ReportError::Connect {
            addr: addr.to_string(),
            source,
        })?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "report connection closed with error");
        }
    });

    let req = http::Request::builder()
        .method("POST")
        .uri(STATUS_PATH)
        .header("host", host)
        .header("content-type", "application/json")
        .header("user-agent", "pingmesh-agent/0.1")
        .body(Full::new(body))?;

    let resp = sender.send_request(req).await?;
    if resp.status().is_success() {
        debug!(%addr, status = %resp.status(), "report accepted");
        Ok(())
    } else {
        Err(ReportError::Rejected(resp.status()))
    }
}

/// Split a server URL into a connect address (`host:port`) and a Host
/// header value.
fn resolve_authority(server_url: &str) -> Result<(String, String), ReportError> {
    let invalid = || ReportError::InvalidUrl(server_url.to_string());
    let uri: Uri = server_url.trim_end_matches('/').parse().map_err(|_| invalid())?;

    if uri.scheme_str() != Some("http") {
        return Err(invalid());
    }
    let authority = uri.authority().ok_or_else(invalid)?;
    let port = authority.port_u16().unwrap_or(80);

    Ok((format!("{}:{port}", authority.host()), authority.as_str().to_string()))
}
