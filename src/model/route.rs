use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A worker's membership in a route: enough to push jobs onto its queue
/// without a further registry lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerDescriptor {
    pub worker_id: String,
    pub version: String,
    pub queue: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub added_at: DateTime<Utc>,
}

/// An HTTP endpoint the gateway can forward to, and the workers serving it.
///
/// Invariant: `route_id` is always `{METHOD}:{path}` with the method
/// upper-cased; removing the last worker deletes the Route (enforced by
/// the registry, not this struct).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub path: String,
    pub method: String,
    pub timeout: u64,
    #[serde(default)]
    pub worker_nodes: HashMap<String, WorkerDescriptor>,
}

impl Route {
    pub fn new(path: impl Into<String>, method: impl Into<String>, timeout: u64) -> Self {
        Self {
            path: path.into(),
            method: method.into().to_uppercase(),
            timeout,
            worker_nodes: HashMap::new(),
        }
    }

    /// Canonical primary key: `{METHOD}:{path}`.
    pub fn route_id(&self) -> String {
        canonical_route_id(&self.method, &self.path)
    }

    pub fn versions(&self) -> HashSet<String> {
        self.worker_nodes
            .values()
            .map(|w| w.version.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.worker_nodes.is_empty()
    }
}

/// `{METHOD}:{path}` with the method upper-cased, the canonical route id
/// used as the primary key across all registry storage.
pub fn canonical_route_id(method: &str, path: &str) -> String {
    format!("{}:{}", method.to_uppercase(), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_id_is_canonical() {
        let route = Route::new("/api/test/echo", "post", 5);
        assert_eq!(route.route_id(), "POST:/api/test/echo");
    }

    #[test]
    fn versions_collects_distinct_tags() {
        let mut route = Route::new("/api/foo", "POST", 5);
        route.worker_nodes.insert(
            "w1".into(),
            WorkerDescriptor {
                worker_id: "w1".into(),
                version: "v1".into(),
                queue: "q1".into(),
                metadata: serde_json::Value::Null,
                added_at: Utc::now(),
            },
        );
        route.worker_nodes.insert(
            "w2".into(),
            WorkerDescriptor {
                worker_id: "w2".into(),
                version: "v1".into(),
                queue: "q2".into(),
                metadata: serde_json::Value::Null,
                added_at: Utc::now(),
            },
        );
        assert_eq!(route.versions(), HashSet::from(["v1".to_string()]));
    }
}
