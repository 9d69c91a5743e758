//! Graph nodes and the transition function
//!
//! The transition function is pure over `RunState` so the edge semantics
//! are testable without a browser.

use serde::{Deserialize, Serialize};
use webpilot_core_types::RunState;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Planner,
    Discovery,
    Generator,
    Executor,
    Healer,
    Verdict,
}

impl Node {
    pub fn name(&self) -> &'static str {
        match self {
            Node::Planner => "planner",
            Node::Discovery => "discovery",
            Node::Generator => "generator",
            Node::Executor => "executor",
            Node::Healer => "healer",
            Node::Verdict => "verdict",
        }
    }

    /// Next node after this one finished against `state`.
    pub fn next(&self, state: &RunState, max_heal_rounds: u32) -> Node {
        match self {
            Node::Planner => Node::Discovery,
            Node::Discovery => Node::Generator,
            Node::Generator => Node::Executor,
            Node::Executor => {
                if state.is_complete() {
                    Node::Verdict
                } else if state.failure.is_none() {
                    Node::Executor
                } else if state.heal_round < max_heal_rounds {
                    Node::Healer
                } else {
                    Node::Verdict
                }
            }
            Node::Healer => Node::Executor,
            Node::Verdict => Node::Verdict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpilot_core_types::{ActionKind, Failure, Intent, PlanStep, ReqId};

    fn state(steps: usize) -> RunState {
        let plan = (0..steps)
            .map(|i| PlanStep::new(Intent::new(format!("e{i}"), ActionKind::Click)))
            .collect();
        RunState::new(ReqId::from("r"), "https://example.org", plan)
    }

    #[test]
    fn linear_prefix_edges() {
        let state = state(1);
        assert_eq!(Node::Planner.next(&state, 3), Node::Discovery);
        assert_eq!(Node::Discovery.next(&state, 3), Node::Generator);
        assert_eq!(Node::Generator.next(&state, 3), Node::Executor);
    }

    #[test]
    fn executor_loops_until_plan_is_done() {
        let mut state = state(2);
        assert_eq!(Node::Executor.next(&state, 3), Node::Executor);
        state.step_idx = 2;
        assert_eq!(Node::Executor.next(&state, 3), Node::Verdict);
    }

    #[test]
    fn failure_routes_to_healer_until_exhausted() {
        let mut state = state(2);
        state.failure = Failure::NotVisible;
        assert_eq!(Node::Executor.next(&state, 3), Node::Healer);
        state.heal_round = 3;
        assert_eq!(Node::Executor.next(&state, 3), Node::Verdict);
        assert_eq!(Node::Healer.next(&state, 3), Node::Executor);
    }

    #[test]
    fn zero_heal_rounds_never_enters_the_healer() {
        let mut state = state(1);
        state.failure = Failure::Timeout;
        assert_eq!(Node::Executor.next(&state, 0), Node::Verdict);
    }
}
