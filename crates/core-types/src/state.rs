//! Run state threaded through the orchestrator
//!
//! The orchestrator detects state change by shallow comparison when it
//! checkpoints, so composite fields (`plan`, `heal_events`, `step_history`)
//! must be replaced wholesale, never mutated in place. The helpers here
//! (`push_heal_event`, `record_step`) do exactly that.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{PlanStep, ReqId, RuntimeProfile, StrategyKind};

/// Why a step (or the run) stopped making progress.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Failure {
    #[default]
    None,
    NotUnique,
    NotVisible,
    Disabled,
    Unstable,
    Timeout,
    DiscoveryFailed,
    Blocked,
}

impl Failure {
    pub fn name(&self) -> &'static str {
        match self {
            Failure::None => "none",
            Failure::NotUnique => "not_unique",
            Failure::NotVisible => "not_visible",
            Failure::Disabled => "disabled",
            Failure::Unstable => "unstable",
            Failure::Timeout => "timeout",
            Failure::DiscoveryFailed => "discovery_failed",
            Failure::Blocked => "blocked",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Failure::None)
    }
}

/// Final classification of a run. Priority: blocked > fail > pass > partial.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Partial,
    Fail,
    Blocked,
}

impl Verdict {
    pub fn name(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Partial => "PARTIAL",
            Verdict::Fail => "FAIL",
            Verdict::Blocked => "BLOCKED",
        }
    }

    /// Process exit code mirroring the verdict.
    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Pass => 0,
            Verdict::Blocked => 2,
            Verdict::Fail | Verdict::Partial => 1,
        }
    }
}

/// Phase of a heal round.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealPhase {
    Reveal,
    Reprobe,
    Stabilize,
}

impl HealPhase {
    pub fn name(&self) -> &'static str {
        match self {
            HealPhase::Reveal => "reveal",
            HealPhase::Reprobe => "reprobe",
            HealPhase::Stabilize => "stabilize",
        }
    }
}

/// Outcome tag on a heal event.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealEventKind {
    Recovered,
    Retried,
    /// Reprobe discovery returned nothing for this element.
    DiscoveryNone,
    /// Reprobe returned the same selector as the previous round.
    SameSelector,
    Failed,
}

impl HealEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            HealEventKind::Recovered => "recovered",
            HealEventKind::Retried => "retried",
            HealEventKind::DiscoveryNone => "discovery_none",
            HealEventKind::SameSelector => "same_selector",
            HealEventKind::Failed => "failed",
        }
    }
}

/// One heal attempt, appended to `RunState::heal_events`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealEvent {
    pub step_idx: usize,
    pub heal_round: u32,
    pub phase: HealPhase,
    pub outcome: HealEventKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    pub latency_ms: u64,
}

/// One executed (or attempted) step, kept in `context.step_history`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepTrace {
    pub idx: usize,
    pub selector: String,
    pub strategy: Option<StrategyKind>,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub latency_ms: u64,
    pub heal_round: u32,
    pub status: StepStatus,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    Failed,
    Skipped,
}

/// Mutable bag of run-scoped context.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    pub url: String,

    /// Currently loaded URL, updated after navigation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_url: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dataset_row: BTreeMap<String, String>,

    /// Session scope segment for cache keying (domain + path + identity
    /// proxy + epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_scope: Option<String>,

    /// Runtime profile detected on first navigation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<RuntimeProfile>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub step_history: Vec<StepTrace>,

    /// Outcome of assert_* steps, by step index.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub assertions: BTreeMap<usize, bool>,
}

/// The serializable state threaded through the orchestration graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub req_id: ReqId,

    /// Next step to execute; advances only on gate pass + action success.
    pub step_idx: usize,

    /// Resets to 0 on step success; capped at `max_heal_rounds`.
    pub heal_round: u32,

    pub failure: Failure,

    pub plan: Vec<PlanStep>,

    pub context: RunContext,

    /// Append-only; mutated by reassignment only (shallow-compare contract).
    pub heal_events: Vec<HealEvent>,

    /// Unset until the verdict node runs; immutable afterwards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
}

impl RunState {
    pub fn new(req_id: ReqId, url: impl Into<String>, plan: Vec<PlanStep>) -> Self {
        Self {
            req_id,
            step_idx: 0,
            heal_round: 0,
            failure: Failure::None,
            plan,
            context: RunContext {
                url: url.into(),
                ..RunContext::default()
            },
            heal_events: Vec::new(),
            verdict: None,
        }
    }

    pub fn current_step(&self) -> Option<&PlanStep> {
        self.plan.get(self.step_idx)
    }

    pub fn is_complete(&self) -> bool {
        self.step_idx >= self.plan.len()
    }

    /// Append a heal event by whole-field reassignment.
    pub fn push_heal_event(&mut self, event: HealEvent) {
        let mut events = self.heal_events.clone();
        events.push(event);
        self.heal_events = events;
    }

    /// Append a step trace by whole-field reassignment of the context.
    pub fn record_step(&mut self, trace: StepTrace) {
        let mut context = self.context.clone();
        context.step_history.push(trace);
        self.context = context;
    }

    /// Replace the step at `idx` by rebuilding the plan vector.
    pub fn replace_step(&mut self, idx: usize, step: PlanStep) {
        let mut plan = self.plan.clone();
        if idx < plan.len() {
            plan[idx] = step;
        }
        self.plan = plan;
    }

    /// Total heal rounds spent across all steps.
    pub fn total_heal_rounds(&self) -> u32 {
        self.heal_events
            .iter()
            .filter(|e| e.phase == HealPhase::Reprobe)
            .count() as u32
    }

    /// Count of discovery_none events for the current step, used by the
    /// heal loop guard.
    pub fn discovery_none_streak(&self, step_idx: usize) -> u32 {
        self.heal_events
            .iter()
            .rev()
            .take_while(|e| e.step_idx == step_idx)
            .take_while(|e| e.outcome == HealEventKind::DiscoveryNone)
            .count() as u32
    }
}
