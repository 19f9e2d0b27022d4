//! Collector mode — runs the status store, retention sweeper, and API.
//!
//! In this mode, the daemon:
//! 1. Creates the in-memory status store with the retention policy
//! 2. Starts the retention sweeper in the background
//! 3. Serves the HTTP API (and static files, if the web root exists)
//! 4. On Ctrl-C, drains HTTP, stops the sweeper, and exits

use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::sync::watch;
use tracing::{error, info, warn};

use pingmesh_state::{RetentionConfig, RetentionSweeper, StatusStore};

/// Settings for collector mode.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub addr: SocketAddr,
    pub web_root: Option<PathBuf>,
    pub retention: RetentionConfig,
}

/// Run the collector until Ctrl-C.
pub async fn run_collector(config: CollectorConfig) -> anyhow::Result<()> {
    info!("pingmesh collector starting");

    // ── Status store ─────────────────────────────────────────────
    let store = StatusStore::new(config.retention);
    info!(
        window_secs = config.retention.window.as_secs(),
        sweep_secs = config.retention.sweep_interval.as_secs(),
        "status store initialized"
    );

    // ── Background tasks ─────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_handle = RetentionSweeper::spawn(store.clone(), shutdown_rx);

    // ── HTTP server ──────────────────────────────────────────────
    let web_root = match config.web_root {
        Some(dir) if dir.is_dir() => {
            info!(path = ?dir, "serving static files");
            Some(dir)
        }
        Some(dir) => {
            warn!(path = ?dir, "web root not found, static files disabled");
            None
        }
        None => None,
    };

    let router = pingmesh_api::build_router(store, web_root);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "API server starting");

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    let _ = sweeper_handle.await;

    info!("pingmesh collector stopped");
    Ok(())
}
