//! Plans and plan steps
//!
//! A plan is the compiled, ordered list of intents for one run. Discovery
//! enriches each step with a selector; the healer may later upgrade it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Candidate, Intent, ReqId, StrategyKind};

/// An intent enriched with discovery results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub intent: Intent,

    /// Concrete locator, present once discovery has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// Confidence in [0, 1]; 0 until discovered.
    #[serde(default)]
    pub confidence: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,

    #[serde(default)]
    pub stable: bool,

    /// Alternative selectors, best first, for the healer to fall back on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_chain: Vec<String>,

    /// Milliseconds since the run's monotonic origin when discovery landed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovered_at: Option<u64>,
}

impl PlanStep {
    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            selector: None,
            confidence: 0.0,
            strategy: None,
            stable: false,
            fallback_chain: Vec::new(),
            discovered_at: None,
        }
    }

    pub fn is_discovered(&self) -> bool {
        self.selector.is_some()
    }

    /// Apply a discovery (or heal) result to this step.
    pub fn apply_candidate(&mut self, candidate: &Candidate, discovered_at: u64) {
        self.selector = Some(candidate.selector.clone());
        self.confidence = candidate.score;
        self.strategy = Some(candidate.strategy.clone());
        self.stable = candidate.stable;
        self.discovered_at = Some(discovered_at);
    }
}

/// The normalized input a shell hands the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub req_id: ReqId,

    /// Target URL the run starts at.
    pub url: String,

    pub intents: Vec<Intent>,

    /// Substitution variables for `${var}` templates in step values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dataset_row: BTreeMap<String, String>,

    /// Opaque cookies/storage blob restored into the browser context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,
}

impl RunRequest {
    pub fn new(url: impl Into<String>, intents: Vec<Intent>) -> Self {
        Self {
            req_id: ReqId::new(),
            url: url.into(),
            intents,
            dataset_row: BTreeMap::new(),
            session_state: None,
        }
    }

    pub fn with_req_id(mut self, req_id: ReqId) -> Self {
        self.req_id = req_id;
        self
    }

    pub fn with_dataset_row(mut self, row: BTreeMap<String, String>) -> Self {
        self.dataset_row = row;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ActionKind;

    #[test]
    fn apply_candidate_enriches_step() {
        let mut step = PlanStep::new(Intent::new("Amount", ActionKind::Fill));
        assert!(!step.is_discovered());

        let candidate = Candidate::new("[name=\"Amount\"]", StrategyKind::NameAttr);
        step.apply_candidate(&candidate, 120);

        assert_eq!(step.selector.as_deref(), Some("[name=\"Amount\"]"));
        assert_eq!(step.strategy, Some(StrategyKind::NameAttr));
        assert!(step.stable);
        assert_eq!(step.discovered_at, Some(120));
    }
}
