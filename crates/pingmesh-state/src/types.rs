//! Domain types for the status store.
//!
//! `ReportPayload` is the unvalidated record an agent sends over the wire.
//! It becomes a `NodeReport` only through validation, so every
//! `NodeReport`, `ConnectionObservation` and `HistoryEntry` held by the
//! store satisfies the address and range checks.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::StatusError;

// ── Node identity ─────────────────────────────────────────────────

/// A node identifier: a dotted-quad IPv4 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeAddr(Ipv4Addr);

impl NodeAddr {
    pub fn ip(&self) -> Ipv4Addr {
        self.0
    }
}

impl FromStr for NodeAddr {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv4Addr>()
            .map(Self)
            .map_err(|_| StatusError::MalformedInput(format!("invalid IPv4 address: {s:?}")))
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for NodeAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NodeAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── Wire records ──────────────────────────────────────────────────

/// A node status report as sent by an agent, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub node_ip: String,
    /// When the measurements were taken (RFC3339).
    pub timestamp: DateTime<Utc>,
    pub connections: Vec<ConnectionPayload>,
}

/// One peer measurement inside a `ReportPayload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPayload {
    pub target_ip: String,
    /// Average round-trip latency in milliseconds.
    pub latency: f64,
    /// Packet loss percentage.
    pub packet_loss: f64,
    pub is_connected: bool,
}

// ── Validated records ─────────────────────────────────────────────

/// A validated measurement from a reporting node to one peer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionObservation {
    target_ip: NodeAddr,
    latency: f64,
    packet_loss: f64,
    is_connected: bool,
}

impl ConnectionObservation {
    pub(crate) fn new(target_ip: NodeAddr, latency: f64, packet_loss: f64, is_connected: bool) -> Self {
        Self {
            target_ip,
            latency,
            packet_loss,
            is_connected,
        }
    }

    pub fn target_ip(&self) -> NodeAddr {
        self.target_ip
    }

    /// Latency in milliseconds, always `>= 0`.
    pub fn latency(&self) -> f64 {
        self.latency
    }

    /// Packet loss percentage in `[0, 100]`.
    pub fn packet_loss(&self) -> f64 {
        self.packet_loss
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }
}

/// A validated node status report: the value kept in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeReport {
    node_ip: NodeAddr,
    timestamp: DateTime<Utc>,
    connections: Vec<ConnectionObservation>,
}

impl NodeReport {
    pub(crate) fn new(
        node_ip: NodeAddr,
        timestamp: DateTime<Utc>,
        connections: Vec<ConnectionObservation>,
    ) -> Self {
        Self {
            node_ip,
            timestamp,
            connections,
        }
    }

    pub fn node_ip(&self) -> NodeAddr {
        self.node_ip
    }

    /// When the measurements were taken, not when the report arrived.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Observations in the order the agent made them. Never empty.
    pub fn connections(&self) -> &[ConnectionObservation] {
        &self.connections
    }

    /// The history entry recorded for this report.
    pub fn to_history_entry(&self) -> HistoryEntry {
        HistoryEntry {
            timestamp: self.timestamp,
            connections: self.connections.clone(),
        }
    }
}

/// One retained report in a node's history.
///
/// Serialized as `{"Timestamp": .., "Connections": [..]}`; existing
/// dashboards read these keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HistoryEntry {
    timestamp: DateTime<Utc>,
    connections: Vec<ConnectionObservation>,
}

impl HistoryEntry {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn connections(&self) -> &[ConnectionObservation] {
        &self.connections
    }
}
