use std::collections::HashMap;
use std::sync::Mutex;

use super::{Candidate, RoutingContext, RoutingStrategy};
use crate::error::StrategyError;

/// Cycles through a route's candidates in stable order, one per selection.
///
/// Candidates are sorted by `worker_id` before indexing so the cursor stays
/// meaningful even as the online set churns between calls.
pub struct RoundRobinStrategy {
    cursors: Mutex<HashMap<String, usize>>,
}

impl RoundRobinStrategy {
    pub fn new() -> Self {
        Self {
            cursors: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for RoundRobinStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingStrategy for RoundRobinStrategy {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn select(
        &self,
        route_id: &str,
        candidates: &[Candidate],
        _context: &RoutingContext,
    ) -> Result<Candidate, StrategyError> {
        let mut sorted: Vec<&Candidate> = candidates.iter().collect();
        sorted.sort_by(|a, b| a.worker_id.cmp(&b.worker_id));

        let mut cursors = self.cursors.lock().expect("round robin cursor lock poisoned");
        let cursor = cursors.entry(route_id.to_string()).or_insert(0);
        let picked = sorted[*cursor % sorted.len()].clone();
        *cursor = (*cursor + 1) % sorted.len();
        Ok(picked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::sample_candidates;

    #[test]
    fn cycles_through_candidates_in_order() {
        let strategy = RoundRobinStrategy::new();
        let candidates = sample_candidates();
        let ctx = RoutingContext::none();
        let first = strategy.select("GET:/x", &candidates, &ctx).unwrap();
        let second = strategy.select("GET:/x", &candidates, &ctx).unwrap();
        let third = strategy.select("GET:/x", &candidates, &ctx).unwrap();
        assert_ne!(first.worker_id, second.worker_id);
        assert_eq!(first.worker_id, third.worker_id);
    }

    #[test]
    fn cursor_is_scoped_per_route() {
        let strategy = RoundRobinStrategy::new();
        let candidates = sample_candidates();
        let ctx = RoutingContext::none();
        strategy.select("GET:/a", &candidates, &ctx).unwrap();
        let first_b = strategy.select("GET:/b", &candidates, &ctx).unwrap();
        let sorted_first = {
            let mut sorted = candidates.clone();
            sorted.sort_by(|a, b| a.worker_id.cmp(&b.worker_id));
            sorted[0].worker_id.clone()
        };
        assert_eq!(first_b.worker_id, sorted_first);
    }
}
