//! Metrics documents and the running maximum folded from them

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// One poll of the service's metrics endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// `system.thread_count`
    pub thread_count: u64,
    /// `system.active_connections`
    pub active_connections: u64,
    /// When the document was received
    pub at: DateTime<Utc>,
}

impl MetricsSnapshot {
    /// Extract the concurrency counters from a metrics document
    ///
    /// Missing or non-numeric counters read as 0, matching a service that
    /// has not published them yet.
    pub fn from_document(doc: &Value, at: DateTime<Utc>) -> Self {
        let counter = |name: &str| doc.pointer(&format!("/system/{}", name)).and_then(as_count);
        Self {
            thread_count: counter("thread_count").unwrap_or(0),
            active_connections: counter("active_connections").unwrap_or(0),
            at,
        }
    }
}

fn as_count(v: &Value) -> Option<u64> {
    v.as_u64()
        .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Running maxima of the concurrency counters for one sampling run
///
/// Snapshots are folded in and dropped; only the maxima are retained.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningMax {
    summary: SamplingSummary,
}

impl RunningMax {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one snapshot into the maxima
    pub fn observe(&mut self, snapshot: &MetricsSnapshot) {
        let s = &mut self.summary;
        s.max_thread_count = s.max_thread_count.max(snapshot.thread_count);
        s.max_active_connections = s.max_active_connections.max(snapshot.active_connections);
        s.samples += 1;
    }

    /// Count a poll that produced no snapshot
    pub fn record_failure(&mut self) {
        self.summary.failed_polls += 1;
    }

    /// Counters so far
    pub fn summary(&self) -> SamplingSummary {
        self.summary
    }
}

/// What a sampling run saw
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SamplingSummary {
    pub max_thread_count: u64,
    pub max_active_connections: u64,
    pub samples: u64,
    pub failed_polls: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_nested_counters() {
        let doc = json!({"system": {"thread_count": 9, "active_connections": 42}, "wal": {}});
        let s = MetricsSnapshot::from_document(&doc, Utc::now());
        assert_eq!(s.thread_count, 9);
        assert_eq!(s.active_connections, 42);
    }

    #[test]
    fn test_missing_counters_read_zero() {
        let s = MetricsSnapshot::from_document(&json!({"uptime": 3}), Utc::now());
        assert_eq!((s.thread_count, s.active_connections), (0, 0));

        let s = MetricsSnapshot::from_document(&json!({"system": {"thread_count": "7"}}), Utc::now());
        assert_eq!(s.thread_count, 7);
    }

    #[test]
    fn test_running_max_keeps_peak() {
        let mut max = RunningMax::new();
        for (t, c) in [(4, 1), (12, 30), (6, 50)] {
            max.observe(&MetricsSnapshot {
                thread_count: t,
                active_connections: c,
                at: Utc::now(),
            });
        }
        max.record_failure();

        let summary = max.summary();
        assert_eq!(summary.max_thread_count, 12);
        assert_eq!(summary.max_active_connections, 50);
        assert_eq!(summary.samples, 3);
        assert_eq!(summary.failed_polls, 1);
    }
}
