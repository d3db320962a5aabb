use rand::seq::SliceRandom;

use super::{Candidate, RoutingContext, RoutingStrategy};
use crate::error::StrategyError;

/// Picks a uniformly random candidate. The default strategy.
#[derive(Debug, Default)]
pub struct RandomStrategy;

impl RandomStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl RoutingStrategy for RandomStrategy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn select(
        &self,
        _route_id: &str,
        candidates: &[Candidate],
        _context: &RoutingContext,
    ) -> Result<Candidate, StrategyError> {
        let mut rng = rand::thread_rng();
        candidates
            .choose(&mut rng)
            .cloned()
            .ok_or_else(|| StrategyError::Unknown("no candidates".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::sample_candidates;

    #[test]
    fn always_returns_one_of_the_candidates() {
        let strategy = RandomStrategy::new();
        let candidates = sample_candidates();
        let picked = strategy
            .select("GET:/x", &candidates, &RoutingContext::none())
            .unwrap();
        assert!(candidates.iter().any(|c| c.worker_id == picked.worker_id));
    }
}
