//! Pluggable load-balancing strategies for picking a worker to serve a job.
//!
//! The dispatcher always filters candidates down to `online` nodes before
//! calling a strategy, so strategies themselves never look at `NodeStatus`.

mod least_in_flight;
mod pinned_version;
mod random;
mod round_robin;
mod weighted_latency;

pub use least_in_flight::LeastInFlightStrategy;
pub use pinned_version::PinnedVersionStrategy;
pub use random::RandomStrategy;
pub use round_robin::RoundRobinStrategy;
pub use weighted_latency::WeightedLatencyStrategy;

use crate::error::StrategyError;
use crate::model::NodeMetrics;

/// A worker eligible to receive a job, stripped down to what strategies
/// need to pick among them.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub worker_id: String,
    pub queue: String,
    pub version: String,
    pub metrics: NodeMetrics,
}

/// Per-request routing hints the dispatcher can't bake into a strategy's
/// own configuration — currently just an `X-API-Version` override.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingContext {
    pub version: Option<String>,
}

impl RoutingContext {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
        }
    }
}

/// Selects one candidate worker for a route out of those currently online.
pub trait RoutingStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `candidates` is guaranteed non-empty by the dispatcher.
    fn select(
        &self,
        route_id: &str,
        candidates: &[Candidate],
        context: &RoutingContext,
    ) -> Result<Candidate, StrategyError>;
}

/// Builds a [`RoutingStrategy`] from its configured name.
pub struct RoutingStrategyFactory;

impl RoutingStrategyFactory {
    pub fn build(name: &str, pinned_version: Option<&str>) -> Result<Box<dyn RoutingStrategy>, StrategyError> {
        match name {
            "random" => Ok(Box::new(RandomStrategy::new())),
            "round_robin" => Ok(Box::new(RoundRobinStrategy::new())),
            "least_in_flight" => Ok(Box::new(LeastInFlightStrategy::new())),
            "weighted_latency" => Ok(Box::new(WeightedLatencyStrategy::new())),
            "pinned_version" => {
                let version = pinned_version.ok_or_else(|| {
                    StrategyError::Unknown("pinned_version strategy requires a version".to_string())
                })?;
                Ok(Box::new(PinnedVersionStrategy::new(version.to_string())))
            }
            other => Err(StrategyError::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_candidates() -> Vec<Candidate> {
    vec![
        Candidate {
            worker_id: "w1".into(),
            queue: "q1".into(),
            version: "v1".into(),
            metrics: NodeMetrics::default(),
        },
        Candidate {
            worker_id: "w2".into(),
            queue: "q2".into(),
            version: "v2".into(),
            metrics: NodeMetrics::default(),
        },
    ]
}
