use rand::Rng;

use super::{Candidate, RoutingContext, RoutingStrategy};
use crate::error::StrategyError;

/// Weights candidates inversely to their observed average processing time:
/// faster workers get proportionally more traffic. A candidate with no
/// completed requests yet (`avg_process_time_ms == 0`) gets the maximum
/// weight, so cold workers aren't starved while warming up.
#[derive(Debug, Default)]
pub struct WeightedLatencyStrategy;

impl WeightedLatencyStrategy {
    pub fn new() -> Self {
        Self
    }
}

fn weight_of(candidate: &Candidate) -> f64 {
    let latency = candidate.metrics.avg_process_time_ms;
    if latency <= 0.0 {
        1.0
    } else {
        1.0 / latency
    }
}

impl RoutingStrategy for WeightedLatencyStrategy {
    fn name(&self) -> &'static str {
        "weighted_latency"
    }

    fn select(
        &self,
        _route_id: &str,
        candidates: &[Candidate],
        _context: &RoutingContext,
    ) -> Result<Candidate, StrategyError> {
        let weights: Vec<f64> = candidates.iter().map(weight_of).collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return candidates
                .first()
                .cloned()
                .ok_or_else(|| StrategyError::Unknown("no candidates".to_string()));
        }

        let mut pick = rand::thread_rng().gen_range(0.0..total);
        for (candidate, weight) in candidates.iter().zip(weights.iter()) {
            if pick < *weight {
                return Ok(candidate.clone());
            }
            pick -= weight;
        }
        candidates
            .last()
            .cloned()
            .ok_or_else(|| StrategyError::Unknown("no candidates".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::sample_candidates;

    #[test]
    fn favors_lower_latency_worker_over_many_draws() {
        let strategy = WeightedLatencyStrategy::new();
        let mut candidates = sample_candidates();
        candidates[0].metrics.avg_process_time_ms = 10.0;
        candidates[1].metrics.avg_process_time_ms = 1000.0;

        let mut w1_wins = 0;
        for _ in 0..200 {
            if strategy
                .select("GET:/x", &candidates, &RoutingContext::none())
                .unwrap()
                .worker_id
                == "w1"
            {
                w1_wins += 1;
            }
        }
        assert!(w1_wins > 150, "expected w1 to dominate selections, got {w1_wins}/200");
    }
}
