//! One heal round: reveal, reprobe, stabilize

use std::sync::Arc;
use std::time::Instant;

use action_gate::{GateEvaluator, GateOutcome};
use browser_adapter::{AdapterError, PageDriver};
use chrono::Utc;
use discovery_ladder::DiscoveryService;
use selector_cache::key::normalize_url;
use tracing::{debug, info};
use webpilot_core_types::{
    Candidate, Failure, HealEvent, HealEventKind, HealPhase, HealRecord, HealRecordOutcome,
    PlanStep, StrategyKind,
};

use crate::history::HealHistory;
use crate::reveal::Revealer;

const PRIOR_LIMIT: usize = 3;

/// What one round produced. The orchestrator merges this into `RunState`
/// by whole-field reassignment; the engine never touches the state.
#[derive(Debug)]
pub struct HealRoundReport {
    /// Events to append, in order.
    pub events: Vec<HealEvent>,
    /// Upgraded candidate from the reprobe, if any.
    pub candidate: Option<Candidate>,
    /// Gate outcome from the stabilize phase.
    pub gate: Option<GateOutcome>,
    /// The step is actionable again.
    pub recovered: bool,
    /// A loop guard tripped: the caller must force heal exhaustion.
    pub force_exhaust: bool,
}

pub struct HealEngine {
    discovery: Arc<DiscoveryService>,
    gate: GateEvaluator,
    history: Arc<dyn HealHistory>,
    revealer: Revealer,
}

impl HealEngine {
    pub fn new(
        discovery: Arc<DiscoveryService>,
        history: Arc<dyn HealHistory>,
    ) -> Self {
        Self {
            discovery,
            gate: GateEvaluator::new(),
            history,
            revealer: Revealer::new(),
        }
    }

    /// Run one reveal → reprobe → stabilize round for the current step.
    #[allow(clippy::too_many_arguments)]
    pub async fn run_round(
        &self,
        driver: &dyn PageDriver,
        step: &PlanStep,
        step_idx: usize,
        heal_round: u32,
        failure: Failure,
        prior_events: &[HealEvent],
        session_scope: &str,
    ) -> Result<HealRoundReport, AdapterError> {
        let started = Instant::now();
        let mut report = HealRoundReport {
            events: Vec::new(),
            candidate: None,
            gate: None,
            recovered: false,
            force_exhaust: false,
        };
        telemetry::metrics::record_heal_round();

        // Phase 1: reveal. Always runs; visibility failures are often just
        // overlays or lazy loading.
        let reveal = self
            .revealer
            .reveal(driver, step.selector.as_deref())
            .await?;
        telemetry::heal(heal_round, HealPhase::Reveal.name(), "done");
        report.events.push(HealEvent {
            step_idx,
            heal_round,
            phase: HealPhase::Reveal,
            outcome: HealEventKind::Retried,
            strategy: step.strategy.clone(),
            selector: step.selector.clone(),
            detail: Some(format!(
                "scrolled={} overlay_dismissed={} network_idle={}",
                reveal.scrolled, reveal.overlay_dismissed, reveal.network_idle
            )),
            latency_ms: started.elapsed().as_millis() as u64,
        });

        // Phase 2: reprobe, only when the failure suggests the selector
        // itself is wrong.
        let mut target = step.selector.clone();
        if matches!(
            failure,
            Failure::Timeout | Failure::NotUnique | Failure::DiscoveryFailed
        ) {
            let reprobe_started = Instant::now();
            let url = driver.current_url().await?;
            let url_pattern = normalize_url(&url).unwrap_or(url);
            let element = step.intent.normalized_element();

            let preferred: Vec<StrategyKind> = self
                .history
                .best_strategies(&url_pattern, &element, PRIOR_LIMIT)
                .map(|stats| stats.into_iter().map(|s| s.strategy).collect())
                .unwrap_or_default();
            if !preferred.is_empty() {
                debug!(?preferred, "reprobe biased by heal history");
            }

            let outcome = self
                .discovery
                .discover(driver, &step.intent, session_scope, heal_round, &preferred)
                .await?;

            match outcome {
                None => {
                    telemetry::heal(heal_round, HealPhase::Reprobe.name(), "discovery_none");
                    let repeat = last_reprobe(prior_events, step_idx)
                        .map(|e| e.outcome == HealEventKind::DiscoveryNone)
                        .unwrap_or(false);
                    report.events.push(HealEvent {
                        step_idx,
                        heal_round,
                        phase: HealPhase::Reprobe,
                        outcome: HealEventKind::DiscoveryNone,
                        strategy: step.strategy.clone(),
                        selector: None,
                        detail: Some("relaxed ladder exhausted".to_string()),
                        latency_ms: reprobe_started.elapsed().as_millis() as u64,
                    });
                    if repeat {
                        info!(step_idx, "discovery dry twice in a row, forcing heal exit");
                        report.force_exhaust = true;
                    }
                    self.write_history(
                        &url_pattern,
                        &element,
                        step.strategy.clone(),
                        false,
                        heal_round,
                        reprobe_started,
                    );
                    return Ok(report);
                }
                Some(discovered) => {
                    let same_as_current = step.selector.as_deref()
                        == Some(discovered.candidate.selector.as_str());
                    let same_as_last_reprobe = last_reprobe(prior_events, step_idx)
                        .and_then(|e| e.selector.as_deref())
                        == Some(discovered.candidate.selector.as_str());

                    let outcome_kind = if same_as_current {
                        HealEventKind::SameSelector
                    } else {
                        HealEventKind::Retried
                    };
                    telemetry::heal(
                        heal_round,
                        HealPhase::Reprobe.name(),
                        discovered.candidate.strategy.name(),
                    );
                    report.events.push(HealEvent {
                        step_idx,
                        heal_round,
                        phase: HealPhase::Reprobe,
                        outcome: outcome_kind,
                        strategy: Some(discovered.candidate.strategy.clone()),
                        selector: Some(discovered.candidate.selector.clone()),
                        detail: None,
                        latency_ms: reprobe_started.elapsed().as_millis() as u64,
                    });

                    // Same selector twice in a row: the ladder has nothing
                    // new to offer, stop cycling through the orchestrator.
                    if same_as_current && same_as_last_reprobe {
                        info!(step_idx, "reprobe repeated the same selector, forcing heal exit");
                        report.force_exhaust = true;
                    }

                    target = Some(discovered.candidate.selector.clone());
                    report.candidate = Some(discovered.candidate);
                }
            }
        }

        // Phase 3: stabilize and regate with this round's relaxed
        // thresholds.
        if let Some(selector) = target.as_deref() {
            let region = step
                .intent
                .within
                .as_deref()
                .or(step.intent.region.as_deref());
            let gate = self
                .gate
                .evaluate(driver, selector, region, heal_round)
                .await?;
            telemetry::heal(
                heal_round,
                HealPhase::Stabilize.name(),
                if gate.passed() { "recovered" } else { gate.failure.name() },
            );
            report.events.push(HealEvent {
                step_idx,
                heal_round,
                phase: HealPhase::Stabilize,
                outcome: if gate.passed() {
                    HealEventKind::Recovered
                } else {
                    HealEventKind::Failed
                },
                strategy: report
                    .candidate
                    .as_ref()
                    .map(|c| c.strategy.clone())
                    .or_else(|| step.strategy.clone()),
                selector: Some(selector.to_string()),
                detail: None,
                latency_ms: gate.latency_ms,
            });
            report.recovered = gate.passed();
            report.gate = Some(gate);

            let url = driver.current_url().await?;
            let url_pattern = normalize_url(&url).unwrap_or(url);
            self.write_history(
                &url_pattern,
                &step.intent.normalized_element(),
                report
                    .candidate
                    .as_ref()
                    .map(|c| c.strategy.clone())
                    .or_else(|| step.strategy.clone()),
                report.recovered,
                heal_round,
                started,
            );
        }

        Ok(report)
    }

    fn write_history(
        &self,
        url_pattern: &str,
        element: &str,
        strategy: Option<StrategyKind>,
        success: bool,
        heal_round: u32,
        started: Instant,
    ) {
        let record = HealRecord {
            url_pattern: url_pattern.to_string(),
            element: element.to_string(),
            strategy: strategy.unwrap_or(StrategyKind::RoleName),
            outcome: if success {
                HealRecordOutcome::Success
            } else {
                HealRecordOutcome::Fail
            },
            latency_ms: started.elapsed().as_millis() as u64,
            heal_round,
            created_at: Utc::now(),
        };
        if let Err(err) = self.history.record(&record) {
            // Non-fatal by contract.
            tracing::warn!(error = %err, "heal history write failed");
        }
    }
}

fn last_reprobe(events: &[HealEvent], step_idx: usize) -> Option<&HealEvent> {
    events
        .iter()
        .rev()
        .find(|e| e.step_idx == step_idx && e.phase == HealPhase::Reprobe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::SqliteHealHistory;
    use browser_adapter::testkit::{ScriptedElement, ScriptedPage};
    use discovery_ladder::{AdapterRegistry, DiscoveryLadder};
    use selector_cache::SelectorCache;
    use webpilot_core_types::{ActionKind, Intent};

    fn engine() -> HealEngine {
        let discovery = DiscoveryService::new(
            DiscoveryLadder::new(AdapterRegistry::new()),
            Arc::new(SelectorCache::disabled()),
        );
        HealEngine::new(
            Arc::new(discovery),
            Arc::new(SqliteHealHistory::open_in_memory().unwrap()),
        )
    }

    fn failed_step(selector: &str) -> PlanStep {
        let mut step = PlanStep::new(Intent::new("Amount", ActionKind::Fill).with_value("100000"));
        step.selector = Some(selector.to_string());
        step.strategy = Some(StrategyKind::IdClass);
        step
    }

    #[tokio::test]
    async fn reprobe_recovers_a_drifted_selector() {
        // Cached #input-339 is gone; the page now exposes name="Amount".
        let page = ScriptedPage::new("https://app.example.org/opp").with_elements(vec![
            ScriptedElement::new("input[name=\"Amount\"]", "input").name("Amount"),
        ]);
        let step = failed_step("#input-339");

        let report = engine()
            .run_round(&page, &step, 0, 1, Failure::Timeout, &[], "scope")
            .await
            .unwrap();

        assert!(report.recovered);
        let candidate = report.candidate.unwrap();
        assert_eq!(candidate.selector, "[name=\"Amount\"]");
        assert_eq!(candidate.strategy, StrategyKind::NameAttr);
        assert!(report
            .events
            .iter()
            .any(|e| e.phase == HealPhase::Reprobe && e.outcome == HealEventKind::Retried));
        assert!(!report.force_exhaust);
    }

    #[tokio::test]
    async fn discovery_none_twice_forces_exhaustion() {
        let page = ScriptedPage::new("https://app.example.org/opp");
        let step = failed_step("#ghost");

        let first = engine()
            .run_round(&page, &step, 0, 1, Failure::Timeout, &[], "scope")
            .await
            .unwrap();
        assert!(!first.force_exhaust);
        assert!(first
            .events
            .iter()
            .any(|e| e.outcome == HealEventKind::DiscoveryNone));

        let second = engine()
            .run_round(&page, &step, 0, 2, Failure::Timeout, &first.events, "scope")
            .await
            .unwrap();
        assert!(second.force_exhaust);
    }

    #[tokio::test]
    async fn visibility_failures_skip_reprobe_and_restabilize() {
        // Element exists but was hidden behind an overlay; reveal fixes it.
        let page = ScriptedPage::new("https://example.org").with_elements(vec![
            ScriptedElement::new("#cta", "button").id("cta").reveal_on_scroll(),
            ScriptedElement::new("#modal", "div").id("modal").overlay(),
        ]);
        let step = failed_step("#cta");

        let report = engine()
            .run_round(&page, &step, 0, 1, Failure::NotVisible, &[], "scope")
            .await
            .unwrap();

        assert!(report.recovered);
        assert!(report.candidate.is_none());
        assert!(report
            .events
            .iter()
            .all(|e| e.phase != HealPhase::Reprobe));
    }

    #[tokio::test]
    async fn same_selector_twice_forces_exhaustion() {
        // Ladder keeps finding the same selector that keeps failing the
        // gate (duplicate on page -> not unique at gate time is simulated
        // by an element that's disabled).
        let page = ScriptedPage::new("https://example.org").with_elements(vec![
            ScriptedElement::new("input[name=\"Amount\"]", "input")
                .name("Amount")
                .disabled(),
        ]);
        let mut step = failed_step("[name=\"Amount\"]");
        step.strategy = Some(StrategyKind::NameAttr);

        let first = engine()
            .run_round(&page, &step, 0, 1, Failure::Timeout, &[], "scope")
            .await
            .unwrap();
        assert!(!first.recovered);
        assert!(!first.force_exhaust);

        let second = engine()
            .run_round(&page, &step, 0, 2, Failure::Timeout, &first.events, "scope")
            .await
            .unwrap();
        assert!(second.force_exhaust);
    }
}
