use rand::seq::SliceRandom;

use super::{Candidate, RoutingContext, RoutingStrategy};
use crate::error::StrategyError;

/// Restricts selection to workers running a specific version tag. A
/// request-level `RoutingContext.version` (from `X-API-Version`) overrides
/// the strategy's own configured pin; either way, no match means no
/// fallback to the full pool — the caller gets an error instead of being
/// silently routed to the wrong version.
pub struct PinnedVersionStrategy {
    version: String,
}

impl PinnedVersionStrategy {
    pub fn new(version: String) -> Self {
        Self { version }
    }
}

impl RoutingStrategy for PinnedVersionStrategy {
    fn name(&self) -> &'static str {
        "pinned_version"
    }

    fn select(
        &self,
        _route_id: &str,
        candidates: &[Candidate],
        context: &RoutingContext,
    ) -> Result<Candidate, StrategyError> {
        let target = context.version.as_deref().unwrap_or(&self.version);
        let matching: Vec<&Candidate> = candidates.iter().filter(|c| c.version == target).collect();
        let mut rng = rand::thread_rng();
        matching
            .choose(&mut rng)
            .map(|c| (*c).clone())
            .ok_or_else(|| StrategyError::NoMatchingVersion {
                version: target.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::sample_candidates;

    #[test]
    fn restricts_to_pinned_version_when_available() {
        let strategy = PinnedVersionStrategy::new("v2".to_string());
        let candidates = sample_candidates();
        let picked = strategy
            .select("GET:/x", &candidates, &RoutingContext::none())
            .unwrap();
        assert_eq!(picked.version, "v2");
    }

    #[test]
    fn returns_error_when_pin_has_no_match_instead_of_falling_back() {
        let strategy = PinnedVersionStrategy::new("v99".to_string());
        let candidates = sample_candidates();
        let err = strategy
            .select("GET:/x", &candidates, &RoutingContext::none())
            .unwrap_err();
        assert!(matches!(err, StrategyError::NoMatchingVersion { version } if version == "v99"));
    }

    #[test]
    fn request_context_overrides_configured_pin() {
        let strategy = PinnedVersionStrategy::new("v1".to_string());
        let candidates = sample_candidates();
        let picked = strategy
            .select("GET:/x", &candidates, &RoutingContext::with_version("v2"))
            .unwrap();
        assert_eq!(picked.version, "v2");
    }
}
