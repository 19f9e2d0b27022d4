//! Reporting agent — probes peers and reports to the collector.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use pingmesh_state::{ConnectionPayload, ReportPayload};

use crate::ping::{PingProber, PingStats, Prober};
use crate::report::{ReportError, submit};

/// Configuration for a reporting agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// This node's own address, reported as `node_ip`.
    pub node_ip: Ipv4Addr,
    /// Base URL of the collector, e.g. `http://10.0.0.1:23480`.
    pub server_url: String,
    /// Peers to probe each round.
    pub peers: Vec<Ipv4Addr>,
    /// Time between reports.
    pub interval: Duration,
    /// Latency at or above which a peer counts as disconnected.
    pub connect_threshold_ms: f64,
    /// Timeout for one report submission.
    pub request_timeout: Duration,
}

impl AgentConfig {
    /// Config with default peers, a 30s interval and 1000ms threshold.
    pub fn new(node_ip: Ipv4Addr, server_url: impl Into<String>) -> Self {
        Self {
            node_ip,
            server_url: server_url.into(),
            peers: default_peers(node_ip),
            interval: Duration::from_secs(30),
            connect_threshold_ms: 1000.0,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// `10.0.0.1` through `10.0.0.10`, excluding `node` itself.
pub fn default_peers(node: Ipv4Addr) -> Vec<Ipv4Addr> {
    (1..=10)
        .map(|i| Ipv4Addr::new(10, 0, 0, i))
        .filter(|peer| *peer != node)
        .collect()
}

/// Periodically measures peers and submits reports.
pub struct Agent<P = PingProber> {
    config: AgentConfig,
    prober: Arc<P>,
}

impl Agent<PingProber> {
    /// Create an agent that probes with the system `ping`.
    pub fn new(config: AgentConfig) -> Self {
        Self::with_prober(config, PingProber::default())
    }
}

impl<P: Prober + 'static> Agent<P> {
    pub fn with_prober(config: AgentConfig, prober: P) -> Self {
        Self {
            config,
            prober: Arc::new(prober),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Probe every peer concurrently and assemble a report.
    ///
    /// Connections keep the configured peer order. The timestamp is taken
    /// before probing starts.
    pub async fn collect_report(&self) -> ReportPayload {
        let timestamp = Utc::now();

        let mut probes = JoinSet::new();
        for (index, peer) in self.config.peers.iter().copied().enumerate() {
            let prober = Arc::clone(&self.prober);
            probes.spawn(async move { (index, prober.probe(peer).await) });
        }

        let mut results: Vec<Option<PingStats>> = vec![None; self.config.peers.len()];
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((index, stats)) => results[index] = Some(stats),
                Err(e) => warn!(error = %e, "probe task failed"),
            }
        }

        let connections = self
            .config
            .peers
            .iter()
            .zip(results)
            .map(|(peer, stats)| {
                let stats = stats.unwrap_or(PingStats::UNREACHABLE);
                ConnectionPayload {
                    target_ip: peer.to_string(),
                    latency: stats.latency_ms,
                    packet_loss: stats.packet_loss,
                    is_connected: self.is_connected(&stats),
                }
            })
            .collect();

        ReportPayload {
            node_ip: self.config.node_ip.to_string(),
            timestamp,
            connections,
        }
    }

    /// A peer is connected if any packet came back under the threshold.
    fn is_connected(&self, stats: &PingStats) -> bool {
        stats.packet_loss < 100.0 && stats.latency_ms < self.config.connect_threshold_ms
    }

    /// Collect one report and send it to the collector.
    pub async fn report_once(&self) -> Result<(), ReportError> {
        let report = self.collect_report().await;
        let connected = report.connections.iter().filter(|c| c.is_connected).count();
        submit(&self.config.server_url, &report, self.config.request_timeout).await?;
        debug!(
            peers = report.connections.len(),
            connected,
            "status report sent"
        );
        Ok(())
    }

    /// Run the report loop until the shutdown signal changes.
    ///
    /// Submission failures are logged and retried on the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            node_ip = %self.config.node_ip,
            server = %self.config.server_url,
            peers = self.config.peers.len(),
            interval_secs = self.config.interval.as_secs(),
            "reporting agent started"
        );

        let start = tokio::time::Instant::now() + self.config.interval;
        let mut ticker = tokio::time::interval_at(start, self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.report_once().await {
                        warn!(error = %e, "failed to send status report");
                    }
                }
                _ = shutdown.changed() => {
                    info!("reporting agent shutting down");
                    break;
                }
            }
        }
    }
}
