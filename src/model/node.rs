use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a worker process, as observed by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Starting,
    Online,
    Busy,
    Offline,
    Error,
    Stopping,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeStatus::Starting => "starting",
            NodeStatus::Online => "online",
            NodeStatus::Busy => "busy",
            NodeStatus::Offline => "offline",
            NodeStatus::Error => "error",
            NodeStatus::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// Rolling request counters and latency average for a single worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub total_requests: u64,
    pub completed_requests: u64,
    pub failed_requests: u64,
    pub avg_process_time_ms: f64,
}

impl NodeMetrics {
    /// Number of requests dispatched but not yet resolved.
    pub fn in_flight(&self) -> i64 {
        self.total_requests as i64 - self.completed_requests as i64
    }

    /// Fold a newly observed processing duration into the rolling average.
    /// Assumes `record_dispatched` was already called when the job was sent.
    pub fn record_completed(&mut self, process_time_ms: f64) {
        self.completed_requests += 1;
        let n = self.completed_requests as f64;
        self.avg_process_time_ms += (process_time_ms - self.avg_process_time_ms) / n;
    }

    pub fn record_failed(&mut self) {
        self.failed_requests += 1;
    }

    pub fn record_dispatched(&mut self) {
        self.total_requests += 1;
    }
}

/// In-memory record of a worker process.
///
/// Invariant: `worker_id` is globally unique; `queue` is stable for the
/// life of the node; `is_alive(max_age) ⇔ (now - last_heartbeat) <= max_age`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub worker_id: String,
    pub version: String,
    pub queue: String,
    pub status: NodeStatus,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    #[serde(default)]
    pub routes: HashSet<String>,
    #[serde(default)]
    pub metrics: NodeMetrics,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Node {
    pub fn new(worker_id: impl Into<String>, version: impl Into<String>, queue: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            worker_id: worker_id.into(),
            version: version.into(),
            queue: queue.into(),
            status: NodeStatus::Online,
            started_at: now,
            last_heartbeat: now,
            routes: HashSet::new(),
            metrics: NodeMetrics::default(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn is_alive(&self, max_age: chrono::Duration) -> bool {
        Utc::now().signed_duration_since(self.last_heartbeat) <= max_age
    }

    pub fn heartbeat(&mut self) {
        self.last_heartbeat = Utc::now();
        if self.status != NodeStatus::Online {
            self.status = NodeStatus::Online;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_alive_respects_max_age() {
        let mut node = Node::new("w1", "v1", "q1");
        assert!(node.is_alive(chrono::Duration::seconds(60)));

        node.last_heartbeat = Utc::now() - chrono::Duration::seconds(120);
        assert!(!node.is_alive(chrono::Duration::seconds(60)));
    }

    #[test]
    fn heartbeat_promotes_to_online() {
        let mut node = Node::new("w1", "v1", "q1");
        node.status = NodeStatus::Offline;
        node.heartbeat();
        assert_eq!(node.status, NodeStatus::Online);
    }

    #[test]
    fn metrics_track_in_flight() {
        let mut metrics = NodeMetrics::default();
        metrics.record_dispatched();
        metrics.record_dispatched();
        metrics.record_completed(10.0);
        assert_eq!(metrics.in_flight(), 1);
    }
}
