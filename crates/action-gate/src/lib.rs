//! Five-point actionability gate
//!
//! Before every action (and after every heal) the gate proves the target
//! is safe to interact with: unique, visible, enabled, bounding box stable,
//! and in the expected scope. All five must pass; the first miss maps to a
//! `Failure` variant the orchestrator can route to the healer.

pub mod evaluator;
pub mod thresholds;

pub use evaluator::{GateChecks, GateEvaluator, GateOutcome};
pub use thresholds::GateThresholds;
