//! Step execution
//!
//! Per step: blocked short-circuit, readiness, selector refresh, the
//! five-point gate, then the action. Expected failures become `Failure`
//! variants on the state; only driver faults propagate as errors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use action_gate::GateEvaluator;
use browser_adapter::{AdapterError, PageDriver};
use discovery_ladder::{AdapterRegistry, DiscoveryService};
use heal_engine::detect_blocked;
use readiness::{ReadinessConfig, ReadinessGate};
use run_store::RunStore;
use tracing::{debug, info, warn};
use webpilot_core_types::{
    ActionKind, ArtifactKind, ArtifactRecord, Failure, RunState, RuntimeProfile, StepStatus,
    StepTrace, StrategyKind,
};

const TYPE_KEY_DELAY: Duration = Duration::from_millis(50);

const KEY_NAMES: &[&str] = &[
    "enter", "tab", "escape", "backspace", "delete", "arrowdown", "arrowup", "arrowleft",
    "arrowright", "pageup", "pagedown", "home", "end",
];

pub struct StepExecutor {
    discovery: Arc<DiscoveryService>,
    gate: GateEvaluator,
    adapters: AdapterRegistry,
    readiness: ReadinessGate,
    run_store: Arc<RunStore>,
}

impl StepExecutor {
    pub fn new(
        discovery: Arc<DiscoveryService>,
        adapters: AdapterRegistry,
        readiness_config: ReadinessConfig,
        run_store: Arc<RunStore>,
    ) -> Self {
        Self {
            discovery,
            gate: GateEvaluator::new(),
            adapters,
            readiness: ReadinessGate::new(readiness_config),
            run_store,
        }
    }

    /// Execute the current step, mutating `state` per the outcome.
    /// Forensic artifacts captured along the way are appended to
    /// `artifacts`.
    pub async fn execute_step(
        &self,
        driver: &dyn PageDriver,
        state: &mut RunState,
        artifacts: &mut Vec<ArtifactRecord>,
    ) -> Result<(), AdapterError> {
        let started = Instant::now();
        let step_idx = state.step_idx;
        let Some(step) = state.current_step().cloned() else {
            return Ok(());
        };

        // 1. Blocked signature short-circuits the whole plan.
        if let Some(signal) = detect_blocked(driver).await? {
            warn!(step_idx, signal = %signal.describe(), "challenge page detected");
            self.capture_forensics(driver, state, artifacts, true).await;
            state.failure = Failure::Blocked;
            state.step_idx = state.plan.len();
            return Ok(());
        }

        // 2. Readiness.
        let profile = state
            .context
            .profile
            .unwrap_or(RuntimeProfile::Static);
        let report = self
            .readiness
            .wait(driver, profile, step.selector.as_deref())
            .await?;
        if !report.is_ready() {
            debug!(step_idx, "target not ready");
            state.failure = Failure::Timeout;
            return Ok(());
        }

        // Go and bare key presses have no target element; act directly.
        if step.intent.action == ActionKind::Go {
            return self.perform_go(driver, state, step_idx, started).await;
        }
        let bare_key = bare_key_press(&step.intent.element, step.intent.action);

        // 3. Refresh the selector when the plan doesn't carry one yet.
        let mut step = step;
        if !step.is_discovered() && bare_key.is_none() {
            let scope = state.context.session_scope.clone().unwrap_or_default();
            let outcome = self
                .discovery
                .discover(driver, &step.intent, &scope, 0, &[])
                .await?;
            match outcome {
                Some(found) => {
                    step.apply_candidate(&found.candidate, started.elapsed().as_millis() as u64);
                    step.fallback_chain = found.fallback_chain;
                    state.replace_step(step_idx, step.clone());
                }
                None if step.intent.action == ActionKind::Press => {
                    // "press Enter" with no addressable element: key goes
                    // to the focused element.
                    return self
                        .perform_bare_press(driver, state, step_idx, started)
                        .await;
                }
                None => {
                    info!(step_idx, element = %step.intent.element, "discovery exhausted");
                    state.failure = Failure::DiscoveryFailed;
                    return Ok(());
                }
            }
        }

        if let Some(key) = bare_key {
            debug!(step_idx, key = %key, "bare key press");
            return self.perform_bare_press(driver, state, step_idx, started).await;
        }

        let selector = step
            .selector
            .clone()
            .unwrap_or_default();
        let scope = state.context.session_scope.clone().unwrap_or_default();
        let url = driver.current_url().await?;
        let cache_key = self.discovery.key_for(&step.intent, &scope, &url);

        // 4. Five-point gate.
        let region = step
            .intent
            .within
            .as_deref()
            .or(step.intent.region.as_deref());
        let gate = self
            .gate
            .evaluate(driver, &selector, region, state.heal_round)
            .await?;
        if !gate.passed() {
            if let Some(key) = &cache_key {
                self.discovery.cache().record_validation_failure(key);
            }
            state.failure = gate.failure;
            self.record_failure(state, &step, step_idx, &selector, started);
            return Ok(());
        }
        if let Some(key) = &cache_key {
            self.discovery.cache().record_validation_success(key);
        }

        // 5. Perform the action.
        let acted = match &step.strategy {
            Some(StrategyKind::AppAdapter(name)) => {
                self.perform_via_adapter(driver, &step, name).await
            }
            _ => self.perform(driver, &step, &selector, state).await,
        };
        match acted {
            Ok(true) => {}
            Ok(false) => {
                state.failure = Failure::Timeout;
                self.record_failure(state, &step, step_idx, &selector, started);
                return Ok(());
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                debug!(step_idx, error = %err, "action failed");
                state.failure = Failure::Timeout;
                self.record_failure(state, &step, step_idx, &selector, started);
                return Ok(());
            }
        }

        // 6 & 7. Record and advance.
        state.record_step(StepTrace {
            idx: step_idx,
            selector,
            strategy: step.strategy.clone(),
            action: step.intent.action.name().to_string(),
            value: step.intent.value.clone(),
            latency_ms: started.elapsed().as_millis() as u64,
            heal_round: state.heal_round,
            status: StepStatus::Ok,
        });
        state.step_idx += 1;
        state.heal_round = 0;
        state.failure = Failure::None;
        Ok(())
    }

    async fn perform_go(
        &self,
        driver: &dyn PageDriver,
        state: &mut RunState,
        step_idx: usize,
        started: Instant,
    ) -> Result<(), AdapterError> {
        let step = &state.plan[step_idx];
        let target = step
            .intent
            .value
            .clone()
            .unwrap_or_else(|| state.context.url.clone());
        driver.navigate(&target, Duration::ZERO).await?;
        let mut context = state.context.clone();
        context.current_url = Some(driver.current_url().await?);
        state.context = context;

        state.record_step(StepTrace {
            idx: step_idx,
            selector: target,
            strategy: None,
            action: ActionKind::Go.name().to_string(),
            value: None,
            latency_ms: started.elapsed().as_millis() as u64,
            heal_round: state.heal_round,
            status: StepStatus::Ok,
        });
        state.step_idx += 1;
        state.heal_round = 0;
        state.failure = Failure::None;
        Ok(())
    }

    async fn perform_bare_press(
        &self,
        driver: &dyn PageDriver,
        state: &mut RunState,
        step_idx: usize,
        started: Instant,
    ) -> Result<(), AdapterError> {
        let step = &state.plan[step_idx];
        let key = step
            .intent
            .value
            .clone()
            .unwrap_or_else(|| step.intent.element.clone());
        driver.press(None, &key).await?;
        state.record_step(StepTrace {
            idx: step_idx,
            selector: "<focused>".to_string(),
            strategy: None,
            action: ActionKind::Press.name().to_string(),
            value: Some(key),
            latency_ms: started.elapsed().as_millis() as u64,
            heal_round: state.heal_round,
            status: StepStatus::Ok,
        });
        state.step_idx += 1;
        state.heal_round = 0;
        state.failure = Failure::None;
        Ok(())
    }

    async fn perform_via_adapter(
        &self,
        driver: &dyn PageDriver,
        step: &webpilot_core_types::PlanStep,
        name: &str,
    ) -> Result<bool, AdapterError> {
        let Some(adapter) = self.adapters.get(name) else {
            warn!(adapter = name, "adapter vanished from registry");
            return Ok(false);
        };
        let candidate = webpilot_core_types::Candidate::new(
            step.selector.clone().unwrap_or_default(),
            StrategyKind::AppAdapter(name.to_string()),
        );
        let result = adapter
            .act(
                driver,
                &candidate,
                step.intent.action,
                step.intent.value.as_deref(),
            )
            .await?;
        Ok(result.completed)
    }

    /// Direct driver dispatch. Returns `Ok(false)` for an action that ran
    /// but did not produce the expected outcome (assertions).
    async fn perform(
        &self,
        driver: &dyn PageDriver,
        step: &webpilot_core_types::PlanStep,
        selector: &str,
        state: &mut RunState,
    ) -> Result<bool, AdapterError> {
        let value = step.intent.value.as_deref();
        match step.intent.action {
            ActionKind::Click => driver.click(selector).await.map(|_| true),
            ActionKind::Fill => {
                driver.fill(selector, value.unwrap_or_default()).await.map(|_| true)
            }
            ActionKind::Type => driver
                .type_text(selector, value.unwrap_or_default(), TYPE_KEY_DELAY)
                .await
                .map(|_| true),
            ActionKind::Press => driver
                .press(Some(selector), value.unwrap_or("Enter"))
                .await
                .map(|_| true),
            ActionKind::Select => driver
                .select_option(selector, value.unwrap_or_default())
                .await
                .map(|_| true),
            ActionKind::Check => driver.set_checked(selector, true).await.map(|_| true),
            ActionKind::Uncheck => driver.set_checked(selector, false).await.map(|_| true),
            ActionKind::Hover => driver.hover(selector).await.map(|_| true),
            ActionKind::Focus => driver.focus(selector).await.map(|_| true),
            ActionKind::Go => Ok(true),
            ActionKind::AssertVisible => {
                let visible = driver
                    .element_state(selector)
                    .await?
                    .map(|s| s.visible)
                    .unwrap_or(false);
                self.record_assertion(state, visible);
                Ok(visible)
            }
            ActionKind::AssertText => {
                let text = driver.inner_text(selector).await?.unwrap_or_default();
                let expected = value.unwrap_or_default();
                let matched = text
                    .to_lowercase()
                    .contains(&expected.to_lowercase());
                self.record_assertion(state, matched);
                Ok(matched)
            }
        }
    }

    fn record_assertion(&self, state: &mut RunState, ok: bool) {
        let mut context = state.context.clone();
        context.assertions.insert(state.step_idx, ok);
        state.context = context;
    }

    fn record_failure(
        &self,
        state: &mut RunState,
        step: &webpilot_core_types::PlanStep,
        step_idx: usize,
        selector: &str,
        started: Instant,
    ) {
        state.record_step(StepTrace {
            idx: step_idx,
            selector: selector.to_string(),
            strategy: step.strategy.clone(),
            action: step.intent.action.name().to_string(),
            value: step.intent.value.clone(),
            latency_ms: started.elapsed().as_millis() as u64,
            heal_round: state.heal_round,
            status: StepStatus::Failed,
        });
    }

    /// Screenshot (always) plus HTML snapshot (blocked pages) for the
    /// forensic record. Capture failures are logged and swallowed; losing
    /// an artifact must not change the verdict.
    pub async fn capture_forensics(
        &self,
        driver: &dyn PageDriver,
        state: &RunState,
        artifacts: &mut Vec<ArtifactRecord>,
        include_html: bool,
    ) {
        match driver.screenshot().await {
            Ok(png) => match self
                .run_store
                .save_artifact(&state.req_id, ArtifactKind::Screenshot, &png)
            {
                Ok(artifact) => artifacts.push(artifact),
                Err(err) => warn!(error = %err, "screenshot artifact write failed"),
            },
            Err(err) => warn!(error = %err, "screenshot capture failed"),
        }
        if include_html {
            match driver.html().await {
                Ok(html) => match self.run_store.save_artifact(
                    &state.req_id,
                    ArtifactKind::HtmlSnapshot,
                    html.as_bytes(),
                ) {
                    Ok(artifact) => artifacts.push(artifact),
                    Err(err) => warn!(error = %err, "html artifact write failed"),
                },
                Err(err) => warn!(error = %err, "html capture failed"),
            }
        }
    }
}

/// A press intent whose "element" is itself a key name targets the
/// focused element, not a discoverable node.
fn bare_key_press(element: &str, action: ActionKind) -> Option<String> {
    if action != ActionKind::Press {
        return None;
    }
    let folded = element.trim().to_lowercase();
    KEY_NAMES
        .contains(&folded.as_str())
        .then(|| element.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_key_press_detection() {
        assert_eq!(
            bare_key_press("Enter", ActionKind::Press),
            Some("Enter".to_string())
        );
        assert!(bare_key_press("Search Wikipedia", ActionKind::Press).is_none());
        assert!(bare_key_press("Enter", ActionKind::Click).is_none());
    }
}
