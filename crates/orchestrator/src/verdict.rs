//! Verdict and root-cause classification
//!
//! Deterministic over run-state signals: the failure variant, the heal
//! event log, and the step context. The detail string cites the signal
//! that produced the class.

use webpilot_core_types::{Failure, HealEventKind, RcaClass, RunState, Verdict};

/// Why the classifier was invoked, beyond what the state itself records.
#[derive(Clone, Debug, Default)]
pub struct VerdictInputs {
    /// The node-transition cap fired.
    pub recursion_cap: bool,
    /// A driver fault killed the run (browser crash, disconnect).
    pub env_fault: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    pub verdict: Verdict,
    pub rca_class: RcaClass,
    pub rca_detail: String,
}

/// Priority: blocked > fail > pass > partial.
pub fn classify(state: &RunState, inputs: &VerdictInputs) -> Classification {
    if state.failure == Failure::Blocked {
        return Classification {
            verdict: Verdict::Blocked,
            rca_class: RcaClass::Blocked,
            rca_detail: "anti-automation challenge detected during the run".to_string(),
        };
    }

    if let Some(fault) = &inputs.env_fault {
        return Classification {
            verdict: Verdict::Fail,
            rca_class: RcaClass::EnvFault,
            rca_detail: format!("driver fault: {fault}"),
        };
    }

    if state.is_complete() && state.failure.is_none() {
        return Classification {
            verdict: Verdict::Pass,
            rca_class: RcaClass::Unknown,
            rca_detail: "all steps executed and gated clean".to_string(),
        };
    }

    if !state.failure.is_none() {
        let (rca_class, rca_detail) = classify_failure(state);
        return Classification {
            verdict: Verdict::Fail,
            rca_class,
            rca_detail,
        };
    }

    // Terminated without completing the plan and without a hard failure.
    let detail = if inputs.recursion_cap {
        "node transition cap exceeded (escaped cycle)".to_string()
    } else {
        format!(
            "run stopped at step {} of {}",
            state.step_idx,
            state.plan.len()
        )
    };
    Classification {
        verdict: Verdict::Partial,
        rca_class: RcaClass::Unknown,
        rca_detail: detail,
    }
}

fn classify_failure(state: &RunState) -> (RcaClass, String) {
    let step_idx = state.step_idx.min(state.plan.len().saturating_sub(1));
    let at_step = format!("at step {step_idx} after {} heal round(s)", state.heal_round);

    // Assertion outcomes take precedence over the timeout they surface as.
    if state.context.assertions.get(&state.step_idx) == Some(&false) {
        return (
            RcaClass::AssertionMismatch,
            format!("assertion failed {at_step}"),
        );
    }

    match state.failure {
        Failure::Disabled => (
            RcaClass::EnablementIssue,
            format!("target disabled {at_step}"),
        ),
        Failure::NotVisible => (
            RcaClass::VisibilityIssue,
            format!("target not visible despite reveal {at_step}"),
        ),
        Failure::Unstable => (
            RcaClass::TimingInstability,
            format!("bounding box never settled {at_step}"),
        ),
        Failure::DiscoveryFailed => (
            RcaClass::SelectorDrift,
            format!("no strategy produced a selector {at_step}"),
        ),
        Failure::NotUnique => (
            RcaClass::SelectorDrift,
            format!("selector stayed ambiguous {at_step}"),
        ),
        Failure::Timeout => {
            let drifted = state.heal_events.iter().any(|e| {
                e.step_idx == state.step_idx
                    && matches!(
                        e.outcome,
                        HealEventKind::DiscoveryNone | HealEventKind::SameSelector
                    )
            });
            if drifted {
                (
                    RcaClass::SelectorDrift,
                    format!("element vanished and rediscovery dried up {at_step}"),
                )
            } else {
                (
                    RcaClass::TimingInstability,
                    format!("timed out waiting on the target {at_step}"),
                )
            }
        }
        Failure::Blocked | Failure::None => (RcaClass::Unknown, at_step),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpilot_core_types::{
        ActionKind, HealEvent, HealPhase, Intent, PlanStep, ReqId,
    };

    fn state(steps: usize) -> RunState {
        let plan = (0..steps)
            .map(|i| PlanStep::new(Intent::new(format!("e{i}"), ActionKind::Click)))
            .collect();
        RunState::new(ReqId::from("v"), "https://example.org", plan)
    }

    #[test]
    fn completed_clean_run_passes() {
        let mut state = state(2);
        state.step_idx = 2;
        let c = classify(&state, &VerdictInputs::default());
        assert_eq!(c.verdict, Verdict::Pass);
    }

    #[test]
    fn blocked_outranks_everything() {
        let mut state = state(2);
        state.step_idx = 2;
        state.failure = Failure::Blocked;
        let c = classify(&state, &VerdictInputs::default());
        assert_eq!(c.verdict, Verdict::Blocked);
        assert_eq!(c.rca_class, RcaClass::Blocked);
    }

    #[test]
    fn exhausted_heals_fail_with_drift_when_discovery_dried_up() {
        let mut state = state(1);
        state.failure = Failure::Timeout;
        state.heal_round = 3;
        state.push_heal_event(HealEvent {
            step_idx: 0,
            heal_round: 3,
            phase: HealPhase::Reprobe,
            outcome: HealEventKind::DiscoveryNone,
            strategy: None,
            selector: None,
            detail: None,
            latency_ms: 10,
        });
        let c = classify(&state, &VerdictInputs::default());
        assert_eq!(c.verdict, Verdict::Fail);
        assert_eq!(c.rca_class, RcaClass::SelectorDrift);
    }

    #[test]
    fn plain_timeout_is_timing_instability() {
        let mut state = state(1);
        state.failure = Failure::Timeout;
        let c = classify(&state, &VerdictInputs::default());
        assert_eq!(c.rca_class, RcaClass::TimingInstability);
    }

    #[test]
    fn disabled_and_hidden_have_their_own_classes() {
        let mut state = state(1);
        state.failure = Failure::Disabled;
        assert_eq!(
            classify(&state, &VerdictInputs::default()).rca_class,
            RcaClass::EnablementIssue
        );
        state.failure = Failure::NotVisible;
        assert_eq!(
            classify(&state, &VerdictInputs::default()).rca_class,
            RcaClass::VisibilityIssue
        );
    }

    #[test]
    fn assertion_mismatch_beats_timeout() {
        let mut state = state(1);
        state.failure = Failure::Timeout;
        let mut context = state.context.clone();
        context.assertions.insert(0, false);
        state.context = context;
        let c = classify(&state, &VerdictInputs::default());
        assert_eq!(c.rca_class, RcaClass::AssertionMismatch);
    }

    #[test]
    fn recursion_cap_is_partial() {
        let state = state(3);
        let inputs = VerdictInputs {
            recursion_cap: true,
            env_fault: None,
        };
        let c = classify(&state, &inputs);
        assert_eq!(c.verdict, Verdict::Partial);
        assert!(c.rca_detail.contains("cap"));
    }

    #[test]
    fn env_fault_fails_the_run() {
        let mut state = state(2);
        state.step_idx = 1;
        let inputs = VerdictInputs {
            recursion_cap: false,
            env_fault: Some("browser disconnected".to_string()),
        };
        let c = classify(&state, &inputs);
        assert_eq!(c.verdict, Verdict::Fail);
        assert_eq!(c.rca_class, RcaClass::EnvFault);
    }
}
