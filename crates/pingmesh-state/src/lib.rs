//! pingmesh-state — the collector's concurrent status store.
//!
//! Agents report reachability measurements (latency, packet loss,
//! connectivity) to their peers; the collector keeps the latest report
//! per node plus a bounded, append-only history per node.
//!
//! # Architecture
//!
//! ```text
//! StatusStore (Clone, Arc<RwLock<..>>)
//!   ├── ingest()   ← validate ReportPayload, overwrite snapshot + append history
//!   ├── snapshot() → BTreeMap<NodeAddr, NodeReport>
//!   ├── history()  → Vec<HistoryEntry> filtered by TimeRange
//!   └── sweep()    → prune history older than the retention window
//!
//! RetentionSweeper
//!   └── run() → periodic sweep loop until shutdown
//! ```
//!
//! Snapshot and history live behind a single reader/writer lock, so a
//! reader never sees one updated without the other.

pub mod config;
pub mod error;
pub mod query;
pub mod retention;
pub mod store;
pub mod types;
mod validate;

pub use config::parse_duration;
pub use error::{StatusError, StatusResult};
pub use query::TimeRange;
pub use retention::{RetentionConfig, RetentionSweeper, SweepStats};
pub use store::{StatusStore, StoreStats};
pub use types::*;
