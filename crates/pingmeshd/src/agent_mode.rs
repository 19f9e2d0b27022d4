//! Agent mode — runs on fleet nodes and reports to the collector.

use tokio::sync::watch;
use tracing::info;

use pingmesh_probe::{Agent, AgentConfig, PingProber};

/// Run the reporting agent until Ctrl-C.
pub async fn run_agent(config: AgentConfig, ping_count: u32) -> anyhow::Result<()> {
    info!("pingmesh agent starting");

    let agent = Agent::with_prober(config, PingProber { count: ping_count });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let agent_handle = tokio::spawn(async move {
        agent.run(shutdown_rx).await;
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    agent_handle.await?;

    info!("pingmesh agent stopped");
    Ok(())
}
