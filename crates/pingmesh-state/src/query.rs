//! Time-range filtering for history queries.

use chrono::{DateTime, Utc};
use tracing::debug;

/// An optional time bound on each side, both inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// No bounds: every entry matches.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Build a range from raw RFC3339 query values.
    ///
    /// Lenient on purpose: a bound that is empty or fails to parse is
    /// dropped, widening the result instead of failing the query.
    pub fn parse_lenient(start: Option<&str>, end: Option<&str>) -> Self {
        Self {
            start: parse_bound("start", start),
            end: parse_bound("end", end),
        }
    }

    /// `(start absent OR ts >= start) AND (end absent OR ts <= end)`.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| ts >= start) && self.end.is_none_or(|end| ts <= end)
    }
}

fn parse_bound(name: &str, raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            debug!(bound = name, value = raw, error = %e, "ignoring unparsable time bound");
            None
        }
    }
}
