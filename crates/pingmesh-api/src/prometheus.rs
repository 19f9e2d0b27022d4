//! Prometheus text exposition format.
//!
//! Renders store counters and the latest per-peer measurements so a
//! Prometheus server can scrape the collector.

use std::collections::BTreeMap;
use std::fmt::Write;

use pingmesh_state::{ConnectionObservation, NodeAddr, NodeReport, StoreStats};

/// Render store stats and the current snapshot into Prometheus text format.
///
/// Per-peer gauges carry `node` and `target` labels.
pub fn render_prometheus(stats: &StoreStats, snapshot: &BTreeMap<NodeAddr, NodeReport>) -> String {
    let mut out = String::new();

    gauge(&mut out, "pingmesh_nodes", "Nodes that have reported at least once.");
    let _ = writeln!(out, "pingmesh_nodes {}", stats.nodes);

    gauge(&mut out, "pingmesh_history_entries", "Retained history entries across all nodes.");
    let _ = writeln!(out, "pingmesh_history_entries {}", stats.history_entries);

    gauge(
        &mut out,
        "pingmesh_report_timestamp_seconds",
        "Measurement time of the latest report per node.",
    );
    for (node, report) in snapshot {
        let _ = writeln!(
            out,
            "pingmesh_report_timestamp_seconds{{node=\"{node}\"}} {}",
            report.timestamp().timestamp()
        );
    }

    gauge(&mut out, "pingmesh_peer_latency_ms", "Latest average latency to a peer in milliseconds.");
    for_each_peer(&mut out, snapshot, "pingmesh_peer_latency_ms", |c| format!("{:.3}", c.latency()));

    gauge(&mut out, "pingmesh_peer_packet_loss_percent", "Latest packet loss to a peer (0-100).");
    for_each_peer(&mut out, snapshot, "pingmesh_peer_packet_loss_percent", |c| {
        format!("{:.2}", c.packet_loss())
    });

    gauge(&mut out, "pingmesh_peer_connected", "Whether the peer was reachable (1) or not (0).");
    for_each_peer(&mut out, snapshot, "pingmesh_peer_connected", |c| {
        u8::from(c.is_connected()).to_string()
    });

    out
}

fn gauge(out: &mut String, name: &str, help: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
}

fn for_each_peer(
    out: &mut String,
    snapshot: &BTreeMap<NodeAddr, NodeReport>,
    name: &str,
    value: impl Fn(&ConnectionObservation) -> String,
) {
    for (node, report) in snapshot {
        for conn in report.connections() {
            let _ = writeln!(
                out,
                "{name}{{node=\"{node}\",target=\"{}\"}} {}",
                conn.target_ip(),
                value(conn)
            );
        }
    }
}
