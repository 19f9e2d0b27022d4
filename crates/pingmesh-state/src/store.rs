//! StatusStore — the collector's in-memory snapshot and history.
//!
//! Snapshot (latest report per node) and history (retained reports per
//! node) are guarded together by one `tokio::sync::RwLock`. Ingestion and
//! retention sweeps take the write half; queries take the read half. No
//! lock is held across I/O.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{StatusError, StatusResult};
use crate::query::TimeRange;
use crate::retention::{RetentionConfig, SweepStats};
use crate::types::*;

#[derive(Default)]
struct Tables {
    /// Latest accepted report per node, by arrival order.
    snapshot: BTreeMap<NodeAddr, NodeReport>,
    /// Retained reports per node, in arrival order.
    history: BTreeMap<NodeAddr, Vec<HistoryEntry>>,
}

impl Tables {
    fn stats(&self) -> StoreStats {
        StoreStats {
            nodes: self.history.len(),
            snapshots: self.snapshot.len(),
            history_entries: self.history.values().map(Vec::len).sum(),
        }
    }
}

/// Counters describing the store contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Nodes with a history key (reported at least once).
    pub nodes: usize,
    /// Nodes with a snapshot entry.
    pub snapshots: usize,
    /// History entries across all nodes.
    pub history_entries: usize,
}

/// Thread-safe status store shared by ingestion, queries and the sweeper.
#[derive(Clone)]
pub struct StatusStore {
    tables: Arc<RwLock<Tables>>,
    retention: RetentionConfig,
}

impl StatusStore {
    /// Create an empty store with the given retention policy.
    pub fn new(retention: RetentionConfig) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            retention,
        }
    }

    pub fn retention(&self) -> &RetentionConfig {
        &self.retention
    }

    // ── Ingestion ──────────────────────────────────────────────────

    /// Validate a payload and commit it.
    ///
    /// On `MalformedInput` nothing is modified.
    pub async fn ingest(&self, payload: ReportPayload) -> StatusResult<()> {
        let report = payload.validate().inspect_err(|e| {
            debug!(error = %e, "report rejected");
        })?;
        self.ingest_report(report).await;
        Ok(())
    }

    /// Commit a validated report: overwrite the node's snapshot entry and
    /// append to its history in one critical section.
    ///
    /// The snapshot follows arrival order. A report older than the one it
    /// replaces still wins; this is logged so stale overwrites are visible.
    pub async fn ingest_report(&self, report: NodeReport) {
        let node = report.node_ip();
        let entry = report.to_history_entry();
        let timestamp = report.timestamp();

        let mut tables = self.tables.write().await;
        if let Some(previous) = tables.snapshot.insert(node, report) {
            if previous.timestamp() > timestamp {
                warn!(
                    %node,
                    previous = %previous.timestamp(),
                    incoming = %timestamp,
                    "out-of-order report replaced a newer snapshot"
                );
            }
        }
        let history = tables.history.entry(node).or_default();
        history.push(entry);
        let retained = history.len();
        drop(tables);

        debug!(%node, %timestamp, retained, "report ingested");
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Point-in-time copy of the latest report per node.
    pub async fn snapshot(&self) -> BTreeMap<NodeAddr, NodeReport> {
        self.tables.read().await.snapshot.clone()
    }

    /// History entries for `node` whose timestamp falls in `range`, in
    /// arrival order.
    ///
    /// Returns `NotFound` only if the node never reported; a node whose
    /// entries were all pruned or filtered out yields an empty list.
    pub async fn history(&self, node: &NodeAddr, range: &TimeRange) -> StatusResult<Vec<HistoryEntry>> {
        let tables = self.tables.read().await;
        let entries = tables
            .history
            .get(node)
            .ok_or_else(|| StatusError::NotFound(format!("node {node} has no history")))?;

        Ok(entries
            .iter()
            .filter(|e| range.contains(e.timestamp()))
            .cloned()
            .collect())
    }

    pub async fn stats(&self) -> StoreStats {
        self.tables.read().await.stats()
    }

    /// Counters and snapshot copy taken under a single read guard, so
    /// both describe the same state.
    pub async fn stats_and_snapshot(&self) -> (StoreStats, BTreeMap<NodeAddr, NodeReport>) {
        let tables = self.tables.read().await;
        (tables.stats(), tables.snapshot.clone())
    }

    // ── Retention ──────────────────────────────────────────────────

    /// Prune history older than the retention window, relative to now.
    pub async fn sweep(&self) -> SweepStats {
        self.sweep_at(Utc::now()).await
    }

    /// Prune history entries with `now - timestamp > window`.
    ///
    /// `now` is fixed for the whole sweep and the write lock is held from
    /// the first node to the last. Node keys are kept even when their
    /// history becomes empty.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepStats {
        let window = TimeDelta::from_std(self.retention.window).unwrap_or(TimeDelta::MAX);
        let cutoff = now.checked_sub_signed(window);

        let mut tables = self.tables.write().await;
        let mut stats = SweepStats::default();
        for entries in tables.history.values_mut() {
            let before = entries.len();
            if let Some(cutoff) = cutoff {
                entries.retain(|e| e.timestamp() >= cutoff);
            }
            stats.nodes += 1;
            stats.pruned += before - entries.len();
            stats.retained += entries.len();
        }
        drop(tables);

        debug!(
            nodes = stats.nodes,
            pruned = stats.pruned,
            retained = stats.retained,
            "retention sweep finished"
        );
        stats
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new(RetentionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn addr(s: &str) -> NodeAddr {
        s.parse().unwrap()
    }

    fn payload_at(node: &str, timestamp: DateTime<Utc>, latency: f64) -> ReportPayload {
        ReportPayload {
            node_ip: node.to_string(),
            timestamp,
            connections: vec![ConnectionPayload {
                target_ip: "10.0.0.3".to_string(),
                latency,
                packet_loss: 0.0,
                is_connected: true,
            }],
        }
    }

    #[tokio::test]
    async fn ingest_then_query_example() {
        let store = StatusStore::default();
        store.ingest(payload_at("10.0.0.2", t0(), 12.5)).await.unwrap();

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        let report = &snapshot[&addr("10.0.0.2")];
        assert_eq!(report.timestamp(), t0());
        assert_eq!(report.connections()[0].target_ip(), addr("10.0.0.3"));
        assert_eq!(report.connections()[0].latency(), 12.5);
        assert!(report.connections()[0].is_connected());

        let history = store.history(&addr("10.0.0.2"), &TimeRange::unbounded()).await.unwrap();
        assert_eq!(history, vec![report.to_history_entry()]);
    }

    #[tokio::test]
    async fn same_report_twice_keeps_one_snapshot_two_history() {
        let store = StatusStore::default();
        let payload = payload_at("10.0.0.2", t0(), 5.0);
        store.ingest(payload.clone()).await.unwrap();
        store.ingest(payload).await.unwrap();

        assert_eq!(store.snapshot().await.len(), 1);
        let history = store.history(&addr("10.0.0.2"), &TimeRange::unbounded()).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(store.stats().await, StoreStats { nodes: 1, snapshots: 1, history_entries: 2 });
    }

    #[tokio::test]
    async fn malformed_reports_change_nothing() {
        let store = StatusStore::default();
        store.ingest(payload_at("10.0.0.2", t0(), 5.0)).await.unwrap();
        let before_snapshot = store.snapshot().await;

        let mut bad_ip = payload_at("10.0.0.2", t0(), 5.0);
        bad_ip.connections[0].target_ip = "10.0.0.999".to_string();
        let mut empty = payload_at("10.0.0.2", t0(), 5.0);
        empty.connections.clear();
        let mut lossy = payload_at("10.0.0.2", t0(), 5.0);
        lossy.connections[0].packet_loss = 101.0;
        let negative = payload_at("10.0.0.2", t0(), -1.0);
        let bad_node = payload_at("10.0.0", t0(), 5.0);

        for bad in [bad_ip, empty, lossy, negative, bad_node] {
            let err = store.ingest(bad).await.unwrap_err();
            assert!(matches!(err, StatusError::MalformedInput(_)));
        }

        assert_eq!(store.snapshot().await, before_snapshot);
        let history = store.history(&addr("10.0.0.2"), &TimeRange::unbounded()).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(store.stats().await.nodes, 1);
    }

    #[tokio::test]
    async fn snapshot_is_last_write_wins_by_arrival() {
        let store = StatusStore::default();
        store.ingest(payload_at("10.0.0.2", t0(), 1.0)).await.unwrap();
        // Older timestamp, later arrival.
        store
            .ingest(payload_at("10.0.0.2", t0() - Duration::hours(1), 2.0))
            .await
            .unwrap();

        let snapshot = store.snapshot().await;
        let latest = &snapshot[&addr("10.0.0.2")];
        assert_eq!(latest.connections()[0].latency(), 2.0);
        assert_eq!(latest.timestamp(), t0() - Duration::hours(1));
    }

    #[tokio::test]
    async fn history_unknown_node_is_not_found() {
        let store = StatusStore::default();
        store.ingest(payload_at("10.0.0.2", t0(), 1.0)).await.unwrap();
        let err = store
            .history(&addr("10.0.0.9"), &TimeRange::unbounded())
            .await
            .unwrap_err();
        assert!(matches!(err, StatusError::NotFound(_)));
    }

    #[tokio::test]
    async fn history_filter_preserves_arrival_order() {
        let store = StatusStore::default();
        let offsets = [3, 1, 4, 1, 5, 9, 2, 6];
        for (i, h) in offsets.iter().enumerate() {
            store
                .ingest(payload_at("10.0.0.2", t0() + Duration::hours(*h), i as f64))
                .await
                .unwrap();
        }

        let ranges = [
            TimeRange::unbounded(),
            TimeRange::new(Some(t0() + Duration::hours(2)), None),
            TimeRange::new(None, Some(t0() + Duration::hours(4))),
            TimeRange::new(Some(t0() + Duration::hours(2)), Some(t0() + Duration::hours(5))),
            TimeRange::new(Some(t0() + Duration::hours(7)), Some(t0() + Duration::hours(8))),
        ];
        for range in ranges {
            let got: Vec<f64> = store
                .history(&addr("10.0.0.2"), &range)
                .await
                .unwrap()
                .iter()
                .map(|e| e.connections()[0].latency())
                .collect();
            let expected: Vec<f64> = offsets
                .iter()
                .enumerate()
                .filter(|(_, h)| range.contains(t0() + Duration::hours(**h)))
                .map(|(i, _)| i as f64)
                .collect();
            assert_eq!(got, expected, "range {range:?}");
        }

        // Filtered to nothing is an empty list, not NotFound.
        let empty = TimeRange::new(Some(t0() + Duration::hours(100)), None);
        assert!(store.history(&addr("10.0.0.2"), &empty).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sweep_prunes_outside_window() {
        let store = StatusStore::new(RetentionConfig::default());
        let now = t0();
        for hours in [23, 25, 1] {
            store
                .ingest(payload_at("10.0.0.2", now - Duration::hours(hours), hours as f64))
                .await
                .unwrap();
        }

        let stats = store.sweep_at(now).await;
        assert_eq!(stats, SweepStats { nodes: 1, pruned: 1, retained: 2 });

        let kept: Vec<DateTime<Utc>> = store
            .history(&addr("10.0.0.2"), &TimeRange::unbounded())
            .await
            .unwrap()
            .iter()
            .map(HistoryEntry::timestamp)
            .collect();
        assert_eq!(kept, vec![now - Duration::hours(23), now - Duration::hours(1)]);
    }

    #[tokio::test]
    async fn sweep_keeps_boundary_and_future_entries() {
        let store = StatusStore::default();
        let now = t0();
        store.ingest(payload_at("10.0.0.2", now - Duration::hours(24), 1.0)).await.unwrap();
        store.ingest(payload_at("10.0.0.2", now + Duration::minutes(5), 2.0)).await.unwrap();

        let stats = store.sweep_at(now).await;
        assert_eq!(stats.pruned, 0);
        assert_eq!(stats.retained, 2);
    }

    #[tokio::test]
    async fn fully_pruned_node_returns_empty_history() {
        let store = StatusStore::default();
        store.ingest(payload_at("10.0.0.2", t0(), 1.0)).await.unwrap();

        store.sweep_at(t0() + Duration::days(3)).await;

        let history = store.history(&addr("10.0.0.2"), &TimeRange::unbounded()).await.unwrap();
        assert!(history.is_empty());
        // Snapshot entry survives the sweep.
        assert!(store.snapshot().await.contains_key(&addr("10.0.0.2")));
        assert_eq!(store.stats().await, StoreStats { nodes: 1, snapshots: 1, history_entries: 0 });
    }

    #[tokio::test]
    async fn custom_window_is_honoured() {
        let store = StatusStore::new(RetentionConfig {
            window: std::time::Duration::from_secs(3600),
            ..RetentionConfig::default()
        });
        store.ingest(payload_at("10.0.0.2", t0() - Duration::minutes(90), 1.0)).await.unwrap();
        store.ingest(payload_at("10.0.0.2", t0() - Duration::minutes(30), 2.0)).await.unwrap();

        assert_eq!(store.sweep_at(t0()).await.retained, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_ingest_and_snapshot_never_torn() {
        let store = StatusStore::default();
        let writers = 32;
        let readers = 16;

        let mut handles = Vec::new();
        for i in 0..writers {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let node = format!("10.0.1.{i}");
                // Latency encodes the node so each entry can be checked.
                let mut payload = payload_at(&node, t0(), i as f64);
                payload.connections.push(ConnectionPayload {
                    target_ip: node.clone(),
                    latency: i as f64,
                    packet_loss: 0.0,
                    is_connected: true,
                });
                store.ingest(payload).await.unwrap();
            }));
        }
        for _ in 0..readers {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..20 {
                    let snapshot = store.snapshot().await;
                    for (node, report) in &snapshot {
                        let i = node.ip().octets()[3] as f64;
                        assert_eq!(report.node_ip(), *node);
                        assert_eq!(report.connections().len(), 2);
                        assert!(report.connections().iter().all(|c| c.latency() == i));
                        // Snapshot and history move together.
                        let history = store.history(node, &TimeRange::unbounded()).await.unwrap();
                        assert_eq!(history.len(), 1);
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let stats = store.stats().await;
        assert_eq!(stats.snapshots, writers);
        assert_eq!(stats.history_entries, writers);
    }

    #[tokio::test]
    async fn stats_and_snapshot_agree() {
        let store = StatusStore::default();
        store.ingest(payload_at("10.0.0.2", t0(), 1.0)).await.unwrap();
        store.ingest(payload_at("10.0.0.4", t0(), 2.0)).await.unwrap();
        store.ingest(payload_at("10.0.0.4", t0(), 3.0)).await.unwrap();

        let (stats, snapshot) = store.stats_and_snapshot().await;
        assert_eq!(stats, StoreStats { nodes: 2, snapshots: 2, history_entries: 3 });
        assert_eq!(snapshot.len(), stats.snapshots);
        assert_eq!(snapshot[&addr("10.0.0.4")].connections()[0].latency(), 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_blocked_on_lock_exits_on_shutdown_without_pruning() {
        let store = StatusStore::new(RetentionConfig {
            sweep_interval: std::time::Duration::from_secs(60),
            ..RetentionConfig::default()
        });
        let now = Utc::now();
        store.ingest(payload_at("10.0.0.2", now - Duration::days(3), 1.0)).await.unwrap();
        store.ingest(payload_at("10.0.0.2", now, 2.0)).await.unwrap();

        let guard = store.tables.write().await;
        let (tx, rx) = tokio::sync::watch::channel(false);
        let handle = crate::RetentionSweeper::spawn(store.clone(), rx);

        // The tick fires while the write lock is held elsewhere.
        tokio::time::sleep(std::time::Duration::from_secs(61)).await;
        assert!(!handle.is_finished());

        tx.send(true).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();

        assert_eq!(guard.history[&addr("10.0.0.2")].len(), 2);
        drop(guard);
        assert_eq!(store.stats().await.history_entries, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_see_partial_sweep() {
        let store = StatusStore::default();
        let nodes = 64;
        for i in 0..nodes {
            let node = format!("10.0.2.{i}");
            store.ingest(payload_at(&node, t0() - Duration::days(2), 1.0)).await.unwrap();
            store.ingest(payload_at(&node, t0(), 2.0)).await.unwrap();
        }

        let mut readers = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..200 {
                    let entries = store.stats().await.history_entries;
                    assert!(entries == 2 * nodes || entries == nodes, "torn sweep: {entries}");

                    let (_, snapshot) = store.stats_and_snapshot().await;
                    assert_eq!(snapshot.len(), nodes);
                    tokio::task::yield_now().await;
                }
            }));
        }

        let stats = store.sweep_at(t0()).await;
        assert_eq!(stats, SweepStats { nodes, pruned: nodes, retained: nodes });

        for r in readers {
            r.await.unwrap();
        }
        assert_eq!(store.stats().await.history_entries, nodes);
    }
}
