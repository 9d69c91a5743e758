//! The cached value

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use webpilot_core_types::{Candidate, StrategyKind};

use crate::fingerprint::Fingerprint;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub selector: String,
    pub strategy: StrategyKind,
    pub confidence: f64,
    /// Invariant: always true for persisted entries; the write path
    /// rejects volatile strategies.
    pub stable: bool,
    pub dom_fingerprint: Fingerprint,
    pub hit_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn from_candidate(candidate: &Candidate, fingerprint: Fingerprint) -> Self {
        let now = Utc::now();
        Self {
            selector: candidate.selector.clone(),
            strategy: candidate.strategy.clone(),
            confidence: candidate.score,
            stable: candidate.stable,
            dom_fingerprint: fingerprint,
            hit_count: 0,
            created_at: now,
            last_seen_at: now,
        }
    }

    /// Rehydrate the candidate, with a small hit-count boost on top of the
    /// stored confidence. Boosts only ever raise confidence; they never
    /// reorder tiers.
    pub fn to_candidate(&self) -> Candidate {
        let boost = 0.03 * (self.hit_count.min(3) as f64);
        Candidate::new(self.selector.clone(), self.strategy.clone())
            .with_score((self.confidence + boost).clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_count_boost_is_capped() {
        let candidate = Candidate::new("[data-testid=\"amount\"]", StrategyKind::DataTestId);
        let fingerprint = Fingerprint::of_skeleton("html|body");
        let mut entry = CacheEntry::from_candidate(&candidate, fingerprint);

        entry.hit_count = 1;
        let boosted = entry.to_candidate();
        assert!(boosted.score > candidate.score);

        entry.hit_count = 50;
        let capped = entry.to_candidate();
        assert!((capped.score - (candidate.score + 0.09)).abs() < 1e-9);
        assert!(capped.score <= 1.0);
    }
}
