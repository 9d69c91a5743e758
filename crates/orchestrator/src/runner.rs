//! One run, end to end
//!
//! Drives the node graph against a single page, checkpointing after every
//! transition. The browser page is owned by the caller (scoped guard);
//! this type owns everything else about the run.

use std::sync::Arc;

use browser_adapter::PageDriver;
use chrono::Utc;
use discovery_ladder::{AdapterRegistry, DiscoveryService};
use heal_engine::{HealEngine, HealHistory};
use readiness::{ProfileDetector, ReadinessConfig};
use run_store::RunStore;
use selector_cache::key::session_scope;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use webpilot_core_types::{
    ArtifactKind, ArtifactRecord, EngineConfig, Failure, ReqId, RunRecord, RunRequest, RunState,
    PlanStep, StepRecord, StepStatus, Verdict,
};

use crate::checkpoint::CheckpointStore;
use crate::executor::StepExecutor;
use crate::generator::render_script;
use crate::node::Node;
use crate::verdict::{classify, VerdictInputs};
use crate::OrchestratorError;

pub struct RunOptions {
    pub max_heal_rounds: u32,
    pub max_transitions: u32,
    pub persistent_profiles: bool,
}

impl From<&EngineConfig> for RunOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_heal_rounds: config.max_heal_rounds,
            max_transitions: config.max_transitions,
            persistent_profiles: config.persistent_profiles,
        }
    }
}

pub struct Orchestrator {
    executor: StepExecutor,
    heal: HealEngine,
    discovery: Arc<DiscoveryService>,
    profile_detector: ProfileDetector,
    checkpoints: Arc<CheckpointStore>,
    run_store: Arc<RunStore>,
    options: RunOptions,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        discovery: Arc<DiscoveryService>,
        adapters: AdapterRegistry,
        history: Arc<dyn HealHistory>,
        readiness_config: ReadinessConfig,
        profile_detector: ProfileDetector,
        checkpoints: Arc<CheckpointStore>,
        run_store: Arc<RunStore>,
        options: RunOptions,
    ) -> Self {
        Self {
            executor: StepExecutor::new(
                Arc::clone(&discovery),
                adapters,
                readiness_config,
                Arc::clone(&run_store),
            ),
            heal: HealEngine::new(Arc::clone(&discovery), history),
            discovery,
            profile_detector,
            checkpoints,
            run_store,
            options,
        }
    }

    /// Execute a fresh run.
    pub async fn run(
        &self,
        driver: &dyn PageDriver,
        request: &RunRequest,
        plan: Vec<PlanStep>,
        cancel: CancellationToken,
    ) -> Result<RunRecord, OrchestratorError> {
        let mut state = RunState::new(request.req_id.clone(), request.url.clone(), plan);
        let mut context = state.context.clone();
        context.dataset_row = request.dataset_row.clone();
        context.session_scope = Some(session_scope(
            &request.url,
            request.session_state.as_deref(),
            0,
        ));
        state.context = context;
        self.drive(driver, state, cancel).await
    }

    /// Resume from the last checkpoint. Without persistent profiles the
    /// browser state cannot be reconstituted, so the run restarts from
    /// step 0 with the checkpointed plan.
    pub async fn resume(
        &self,
        driver: &dyn PageDriver,
        req_id: &ReqId,
        cancel: CancellationToken,
    ) -> Result<RunRecord, OrchestratorError> {
        self.checkpoints.acquire_resume_lock(req_id)?;
        let loaded = self.checkpoints.load(req_id)?;
        let result = match loaded {
            Some(mut state) => {
                if !self.options.persistent_profiles {
                    info!(req_id = %req_id.0, "no persistent profile, degrading to re-run from step 0");
                    state.step_idx = 0;
                    state.heal_round = 0;
                    state.failure = Failure::None;
                    state.verdict = None;
                }
                self.drive(driver, state, cancel).await
            }
            None => Err(OrchestratorError::Resume(format!(
                "no checkpoint for {}",
                req_id.0
            ))),
        };
        self.checkpoints.release_resume_lock(req_id);
        result
    }

    async fn drive(
        &self,
        driver: &dyn PageDriver,
        mut state: RunState,
        cancel: CancellationToken,
    ) -> Result<RunRecord, OrchestratorError> {
        let started_at = Utc::now();
        let mut artifacts: Vec<ArtifactRecord> = Vec::new();
        let mut node = Node::Planner;
        let mut transitions: u32 = 0;
        let mut inputs = VerdictInputs::default();

        loop {
            if cancel.is_cancelled() {
                warn!(req_id = %state.req_id, "cancellation requested, flushing checkpoint");
                self.checkpoints.save(&state)?;
                break;
            }
            transitions += 1;
            if transitions > self.options.max_transitions {
                warn!(req_id = %state.req_id, transitions, "node transition cap exceeded");
                inputs.recursion_cap = true;
                break;
            }

            match node {
                Node::Planner => {
                    info!(req_id = %state.req_id, steps = state.plan.len(), "plan accepted");
                }
                Node::Discovery => {
                    if let Err(err) = self.enter_page(driver, &mut state).await {
                        if err.is_fatal() {
                            inputs.env_fault = Some(err.to_string());
                            break;
                        }
                        warn!(error = %err, "initial navigation failed");
                        state.failure = Failure::Timeout;
                    }
                }
                Node::Generator => {
                    let script = render_script(&state);
                    match self.run_store.save_artifact(
                        &state.req_id,
                        ArtifactKind::GeneratedScript,
                        script.as_bytes(),
                    ) {
                        Ok(artifact) => artifacts.push(artifact),
                        Err(err) => warn!(error = %err, "script artifact write failed"),
                    }
                }
                Node::Executor => {
                    if !state.is_complete() {
                        if let Err(err) = self
                            .executor
                            .execute_step(driver, &mut state, &mut artifacts)
                            .await
                        {
                            inputs.env_fault = Some(err.to_string());
                            break;
                        }
                    }
                }
                Node::Healer => {
                    self.run_heal_round(driver, &mut state).await?;
                }
                Node::Verdict => break,
            }

            let next = node.next(&state, self.options.max_heal_rounds);
            self.checkpoints.save(&state)?;
            node = next;
        }

        // Final classification; the state is immutable afterwards.
        let classification = classify(&state, &inputs);
        state.verdict = Some(classification.verdict);
        self.checkpoints.save(&state)?;

        if classification.verdict == Verdict::Fail {
            self.executor
                .capture_forensics(driver, &state, &mut artifacts, false)
                .await;
        }

        let record = self.build_record(&state, started_at, &classification, artifacts);
        telemetry::result(
            record.verdict.name(),
            record.steps_executed,
            record.heal_rounds,
        );
        telemetry::metrics::record_verdict(record.verdict.name());
        self.run_store.persist_run(&record)?;
        self.checkpoints.remove(&state.req_id);
        Ok(record)
    }

    /// Discovery node entry: first navigation plus profile detection.
    async fn enter_page(
        &self,
        driver: &dyn PageDriver,
        state: &mut RunState,
    ) -> Result<(), browser_adapter::AdapterError> {
        driver
            .navigate(&state.context.url, std::time::Duration::ZERO)
            .await?;
        let profile = self
            .profile_detector
            .detect(driver, &state.context.url)
            .await?;
        let mut context = state.context.clone();
        context.profile = Some(profile);
        context.current_url = Some(driver.current_url().await?);
        state.context = context;
        Ok(())
    }

    async fn run_heal_round(
        &self,
        driver: &dyn PageDriver,
        state: &mut RunState,
    ) -> Result<(), OrchestratorError> {
        state.heal_round += 1;
        let step_idx = state.step_idx;
        let Some(step) = state.current_step().cloned() else {
            return Ok(());
        };
        let scope = state.context.session_scope.clone().unwrap_or_default();

        let report = self
            .heal
            .run_round(
                driver,
                &step,
                step_idx,
                state.heal_round,
                state.failure,
                &state.heal_events,
                &scope,
            )
            .await
            .map_err(OrchestratorError::Adapter)?;

        // Heal-event mutations are whole-field reassignments; the
        // checkpoint layer compares shallowly.
        for event in report.events {
            state.push_heal_event(event);
        }
        if let Some(candidate) = &report.candidate {
            let mut upgraded = step.clone();
            upgraded.apply_candidate(candidate, Utc::now().timestamp_millis() as u64);
            state.replace_step(step_idx, upgraded);
        }
        if report.recovered {
            state.failure = Failure::None;
        }
        if report.force_exhaust {
            state.heal_round = self.options.max_heal_rounds;
        }
        Ok(())
    }

    fn build_record(
        &self,
        state: &RunState,
        started_at: chrono::DateTime<Utc>,
        classification: &crate::verdict::Classification,
        artifacts: Vec<ArtifactRecord>,
    ) -> RunRecord {
        let steps = state
            .plan
            .iter()
            .enumerate()
            .map(|(idx, step)| {
                let trace = state
                    .context
                    .step_history
                    .iter()
                    .rev()
                    .find(|t| t.idx == idx);
                let heal_rounds = state
                    .heal_events
                    .iter()
                    .filter(|e| {
                        e.step_idx == idx
                            && e.phase == webpilot_core_types::HealPhase::Reveal
                    })
                    .count() as u32;
                StepRecord {
                    idx,
                    element: step.intent.element.clone(),
                    action: step.intent.action.name().to_string(),
                    selector: step.selector.clone(),
                    strategy: step.strategy.clone(),
                    status: trace.map(|t| t.status).unwrap_or(StepStatus::Skipped),
                    heal_rounds,
                    latency_ms: trace.map(|t| t.latency_ms).unwrap_or(0),
                }
            })
            .collect();

        RunRecord {
            req_id: state.req_id.clone(),
            url: state.context.url.clone(),
            verdict: classification.verdict,
            steps_total: state.plan.len(),
            steps_executed: state
                .context
                .step_history
                .iter()
                .filter(|t| t.status == StepStatus::Ok)
                .map(|t| t.idx)
                .collect::<std::collections::BTreeSet<_>>()
                .len(),
            heal_rounds: state
                .heal_events
                .iter()
                .filter(|e| e.phase == webpilot_core_types::HealPhase::Reveal)
                .count() as u32,
            started_at,
            ended_at: Utc::now(),
            rca_class: classification.rca_class,
            rca_detail: classification.rca_detail.clone(),
            steps,
            artifacts,
        }
    }

    pub fn discovery(&self) -> &Arc<DiscoveryService> {
        &self.discovery
    }
}
