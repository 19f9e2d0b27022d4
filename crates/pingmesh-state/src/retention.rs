//! Retention policy and the background sweeper.
//!
//! The sweeper wakes once per `sweep_interval` and prunes every node's
//! history down to the retention window. Each sweep takes the store's
//! write lock once and holds it until all nodes are done.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::store::StatusStore;

/// How long history is kept and how often it is pruned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Period between sweeps.
    pub sweep_interval: Duration,
    /// Maximum age of a history entry.
    pub window: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60 * 60),
            window: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Nodes visited.
    pub nodes: usize,
    /// Entries removed.
    pub pruned: usize,
    /// Entries left across all nodes.
    pub retained: usize,
}

/// Periodically prunes a `StatusStore`'s history.
pub struct RetentionSweeper {
    store: StatusStore,
    interval: Duration,
}

impl RetentionSweeper {
    /// Create a sweeper using the store's configured interval.
    pub fn new(store: StatusStore) -> Self {
        let interval = store.retention().sweep_interval;
        Self { store, interval }
    }

    /// Spawn the sweep loop on the current runtime.
    pub fn spawn(store: StatusStore, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let sweeper = Self::new(store);
        tokio::spawn(async move { sweeper.run(shutdown).await })
    }

    /// Run the sweep loop until the shutdown signal changes.
    ///
    /// The first sweep happens one full interval after start. Shutdown
    /// while waiting for the write lock abandons that sweep before it
    /// touches anything.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            window_secs = self.store.retention().window.as_secs(),
            "retention sweeper started"
        );

        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        stats = self.store.sweep() => {
                            if stats.pruned > 0 {
                                info!(pruned = stats.pruned, retained = stats.retained, "pruned expired history");
                            }
                        }
                        _ = shutdown.changed() => break,
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        info!("retention sweeper shutting down");
    }
}
