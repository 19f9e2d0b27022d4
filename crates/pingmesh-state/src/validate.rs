//! Ingestion-boundary validation.
//!
//! A `ReportPayload` is accepted only when every rule holds; the first
//! failing rule is reported and nothing is admitted.

use crate::error::{StatusError, StatusResult};
use crate::types::*;

impl ReportPayload {
    /// Validate the payload and convert it into a `NodeReport`.
    ///
    /// Rules: the node address is IPv4, there is at least one connection,
    /// and every connection has an IPv4 target, `latency >= 0` and
    /// `packet_loss` in `[0, 100]`. NaN fails the range checks.
    pub fn validate(self) -> StatusResult<NodeReport> {
        let node_ip: NodeAddr = self.node_ip.parse()?;

        if self.connections.is_empty() {
            return Err(StatusError::MalformedInput(format!(
                "report from {node_ip} has no connections"
            )));
        }

        let connections = self
            .connections
            .into_iter()
            .enumerate()
            .map(|(i, conn)| conn.validate(i))
            .collect::<StatusResult<Vec<_>>>()?;

        Ok(NodeReport::new(node_ip, self.timestamp, connections))
    }
}

impl ConnectionPayload {
    fn validate(self, index: usize) -> StatusResult<ConnectionObservation> {
        let target_ip: NodeAddr = self.target_ip.parse().map_err(|e: StatusError| {
            StatusError::MalformedInput(format!("connections[{index}].target_ip: {e}"))
        })?;

        if self.latency.is_nan() || self.latency < 0.0 {
            return Err(StatusError::MalformedInput(format!(
                "connections[{index}].latency must be non-negative: {}",
                self.latency
            )));
        }

        if !(0.0..=100.0).contains(&self.packet_loss) {
            return Err(StatusError::MalformedInput(format!(
                "connections[{index}].packet_loss out of range: {}",
                self.packet_loss
            )));
        }

        Ok(ConnectionObservation::new(
            target_ip,
            self.latency,
            self.packet_loss,
            self.is_connected,
        ))
    }
}
