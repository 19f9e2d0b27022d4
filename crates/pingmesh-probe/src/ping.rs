//! Ping probes and iputils output parsing.

use std::future::Future;
use std::net::Ipv4Addr;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

/// Latency and loss measured for one peer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingStats {
    /// Average round-trip time in milliseconds; 0 when unmeasured.
    pub latency_ms: f64,
    /// Packet loss percentage in `[0, 100]`.
    pub packet_loss: f64,
}

impl PingStats {
    /// Stats for a peer that could not be probed at all.
    pub const UNREACHABLE: PingStats = PingStats {
        latency_ms: 0.0,
        packet_loss: 100.0,
    };
}

/// Measures reachability to a single peer.
pub trait Prober: Send + Sync {
    fn probe(&self, target: Ipv4Addr) -> impl Future<Output = PingStats> + Send;
}

/// `Prober` backed by the system `ping` binary.
#[derive(Debug, Clone)]
pub struct PingProber {
    /// Echo requests per probe (`ping -c`).
    pub count: u32,
}

impl Default for PingProber {
    fn default() -> Self {
        Self { count: 4 }
    }
}

impl Prober for PingProber {
    async fn probe(&self, target: Ipv4Addr) -> PingStats {
        run_ping(target, self.count).await
    }
}

/// Run `ping -c <count> <target>` and parse its summary.
///
/// A failed invocation, including a non-zero exit when every packet is
/// lost, yields `PingStats::UNREACHABLE`.
pub async fn run_ping(target: Ipv4Addr, count: u32) -> PingStats {
    let output = Command::new("ping")
        .arg("-c")
        .arg(count.to_string())
        .arg(target.to_string())
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => {
            let stats = parse_ping_output(&String::from_utf8_lossy(&out.stdout));
            debug!(%target, latency_ms = stats.latency_ms, packet_loss = stats.packet_loss, "ping finished");
            stats
        }
        Ok(out) => {
            debug!(%target, status = %out.status, "ping exited unsuccessfully");
            PingStats::UNREACHABLE
        }
        Err(e) => {
            warn!(%target, error = %e, "failed to run ping");
            PingStats::UNREACHABLE
        }
    }
}

/// Parse the summary lines of iputils `ping` output.
///
/// ```text
/// 4 packets transmitted, 3 received, 25% packet loss, time 3004ms
/// rtt min/avg/max/mdev = 0.041/0.052/0.067/0.010 ms
/// ```
///
/// Latency is the `avg` field, or 0 if missing or unparsable. Packet
/// loss is 100 if its line is present but unparsable, 0 if absent.
pub fn parse_ping_output(output: &str) -> PingStats {
    let latency_ms = output
        .lines()
        .find(|line| line.contains("rtt min/avg/max/mdev"))
        .and_then(|line| line.split('/').nth(4))
        .and_then(|avg| avg.trim().trim_end_matches("ms").trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0);

    let packet_loss = match output.lines().find(|line| line.contains("packet loss")) {
        Some(line) => parse_loss(line).unwrap_or(100.0),
        None => 0.0,
    };

    PingStats {
        latency_ms,
        packet_loss: packet_loss.clamp(0.0, 100.0),
    }
}

fn parse_loss(line: &str) -> Option<f64> {
    let (before, _) = line.split_once('%')?;
    let value = before.rsplit(|c: char| c.is_whitespace() || c == ',').next()?;
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}
