//! pingmesh-probe — the reporting agent.
//!
//! Measures reachability to a fixed set of peers with the system `ping`
//! utility and submits one `ReportPayload` per interval to the collector.
//!
//! # Architecture
//!
//! ```text
//! Agent
//!   ├── collect_report() → probe every peer concurrently via Prober
//!   │   └── PingProber → run_ping() → parse_ping_output()
//!   ├── submit() → POST /api/status (hyper, HTTP/1.1)
//!   └── run() → periodic collect + submit loop until shutdown
//! ```

pub mod agent;
pub mod ping;
pub mod report;

pub use agent::{Agent, AgentConfig, default_peers};
pub use ping::{PingProber, PingStats, Prober, parse_ping_output};
pub use report::{ReportError, submit};
