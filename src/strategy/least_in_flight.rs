use super::{Candidate, RoutingContext, RoutingStrategy};
use crate::error::StrategyError;

/// Picks the candidate with the fewest outstanding (dispatched but not
/// resolved) requests, breaking ties by `worker_id` for determinism.
#[derive(Debug, Default)]
pub struct LeastInFlightStrategy;

impl LeastInFlightStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl RoutingStrategy for LeastInFlightStrategy {
    fn name(&self) -> &'static str {
        "least_in_flight"
    }

    fn select(
        &self,
        _route_id: &str,
        candidates: &[Candidate],
        _context: &RoutingContext,
    ) -> Result<Candidate, StrategyError> {
        candidates
            .iter()
            .min_by(|a, b| {
                a.metrics
                    .in_flight()
                    .cmp(&b.metrics.in_flight())
                    .then_with(|| a.worker_id.cmp(&b.worker_id))
            })
            .cloned()
            .ok_or_else(|| StrategyError::Unknown("no candidates".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::sample_candidates;

    #[test]
    fn picks_the_least_loaded_worker() {
        let strategy = LeastInFlightStrategy::new();
        let mut candidates = sample_candidates();
        candidates[0].metrics.record_dispatched();
        candidates[0].metrics.record_dispatched();
        candidates[1].metrics.record_dispatched();

        let picked = strategy
            .select("GET:/x", &candidates, &RoutingContext::none())
            .unwrap();
        assert_eq!(picked.worker_id, "w2");
    }
}
