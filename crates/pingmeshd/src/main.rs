//! pingmeshd — the pingmesh daemon.
//!
//! One binary, two roles:
//! - `collector`: status store, retention sweeper, HTTP API + static files
//! - `agent`: periodic ping probes of peers, reports sent to the collector
//!
//! # Usage
//!
//! ```text
//! pingmeshd collector --port 23480 --retention 24h --sweep-interval 1h
//! NODE_IP=10.0.0.2 SERVER_URL=http://10.0.0.1:23480 pingmeshd agent
//! ```

mod agent_mode;
mod collector_mode;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use pingmesh_probe::{AgentConfig, default_peers};
use pingmesh_state::{RetentionConfig, parse_duration};

use crate::collector_mode::CollectorConfig;

#[derive(Parser)]
#[command(name = "pingmeshd", about = "pingmesh fleet reachability daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the collector: ingest reports and serve status queries.
    Collector {
        /// Address to bind.
        #[arg(long, env = "PINGMESH_BIND", default_value = "0.0.0.0")]
        bind: IpAddr,

        /// Port to listen on.
        #[arg(long, env = "PINGMESH_PORT", default_value = "23480")]
        port: u16,

        /// Directory of static web UI files. Skipped if it does not exist.
        #[arg(long, env = "PINGMESH_WEB_ROOT", default_value = "web")]
        web_root: PathBuf,

        /// Time between retention sweeps.
        #[arg(long, env = "PINGMESH_SWEEP_INTERVAL", default_value = "1h", value_parser = duration_arg)]
        sweep_interval: Duration,

        /// How long history entries are kept.
        #[arg(long, env = "PINGMESH_RETENTION", default_value = "24h", value_parser = duration_arg)]
        retention: Duration,
    },

    /// Run a reporting agent on a fleet node.
    Agent {
        /// This node's IPv4 address.
        #[arg(long, env = "NODE_IP")]
        node_ip: Ipv4Addr,

        /// Collector base URL, e.g. http://10.0.0.1:23480.
        #[arg(long, env = "SERVER_URL")]
        server_url: String,

        /// Time between reports.
        #[arg(long, env = "PINGMESH_INTERVAL", default_value = "30s", value_parser = duration_arg)]
        interval: Duration,

        /// Peers to probe (repeatable or comma separated). Defaults to 10.0.0.1-10.
        #[arg(long = "peer", env = "PINGMESH_PEERS", value_delimiter = ',')]
        peers: Vec<Ipv4Addr>,

        /// Echo requests per probe.
        #[arg(long, default_value = "4")]
        ping_count: u32,

        /// Latency at or above which a peer counts as disconnected.
        #[arg(long, default_value = "1000")]
        connect_threshold_ms: f64,
    },
}

fn duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s)
        .filter(|d| !d.is_zero())
        .ok_or_else(|| format!("invalid duration {s:?} (expected e.g. 30s, 5m, 1h)"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,pingmesh=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Collector {
            bind,
            port,
            web_root,
            sweep_interval,
            retention,
        } => {
            let config = CollectorConfig {
                addr: SocketAddr::new(bind, port),
                web_root: Some(web_root),
                retention: RetentionConfig {
                    sweep_interval,
                    window: retention,
                },
            };
            collector_mode::run_collector(config).await
        }
        Command::Agent {
            node_ip,
            server_url,
            interval,
            peers,
            ping_count,
            connect_threshold_ms,
        } => {
            let mut config = AgentConfig::new(node_ip, server_url);
            config.interval = interval;
            config.connect_threshold_ms = connect_threshold_ms;
            config.peers = if peers.is_empty() {
                default_peers(node_ip)
            } else {
                peers.into_iter().filter(|p| *p != node_ip).collect()
            };
            agent_mode::run_agent(config, ping_count).await
        }
    }
}
