//! Durable run records and root-cause taxonomy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ReqId, StepStatus, StrategyKind, Verdict};

/// Deterministic root-cause class derived from run-state signals.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RcaClass {
    SelectorDrift,
    TimingInstability,
    VisibilityIssue,
    EnablementIssue,
    AssertionMismatch,
    DataIssue,
    EnvFault,
    Blocked,
    Unknown,
}

impl RcaClass {
    pub fn name(&self) -> &'static str {
        match self {
            RcaClass::SelectorDrift => "selector_drift",
            RcaClass::TimingInstability => "timing_instability",
            RcaClass::VisibilityIssue => "visibility_issue",
            RcaClass::EnablementIssue => "enablement_issue",
            RcaClass::AssertionMismatch => "assertion_mismatch",
            RcaClass::DataIssue => "data_issue",
            RcaClass::EnvFault => "env_fault",
            RcaClass::Blocked => "blocked",
            RcaClass::Unknown => "unknown",
        }
    }
}

/// Child row of a run record: one executed step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub idx: usize,
    pub element: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,
    pub status: StepStatus,
    pub heal_rounds: u32,
    pub latency_ms: u64,
}

/// Artifact captured during a run (screenshot, HTML snapshot, generated
/// script). The run store owns the files; records carry paths.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub kind: ArtifactKind,
    pub path: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Screenshot,
    HtmlSnapshot,
    GeneratedScript,
}

impl ArtifactKind {
    pub fn name(&self) -> &'static str {
        match self {
            ArtifactKind::Screenshot => "screenshot",
            ArtifactKind::HtmlSnapshot => "html_snapshot",
            ArtifactKind::GeneratedScript => "generated_script",
        }
    }
}

/// The final output a shell receives for one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub req_id: ReqId,
    pub url: String,
    pub verdict: Verdict,
    pub steps_total: usize,
    pub steps_executed: usize,
    pub heal_rounds: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub rca_class: RcaClass,
    pub rca_detail: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactRecord>,
}

/// One heal attempt as persisted by the heal history store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealRecord {
    pub url_pattern: String,
    pub element: String,
    pub strategy: StrategyKind,
    pub outcome: HealRecordOutcome,
    pub latency_ms: u64,
    pub heal_round: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealRecordOutcome {
    Success,
    Fail,
}

impl HealRecordOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            HealRecordOutcome::Success => "success",
            HealRecordOutcome::Fail => "fail",
        }
    }
}
