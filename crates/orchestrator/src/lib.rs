//! The orchestration state machine
//!
//! Composes discovery, the gate, the executor, and the healer into a
//! deterministic graph with bounded healing loops and checkpointable
//! state. Node order: planner → discovery → generator → executor, with
//! executor looping on success, branching to the healer on recoverable
//! failure, and everything funneling into the verdict node.

pub mod checkpoint;
pub mod executor;
pub mod generator;
pub mod node;
pub mod runner;
pub mod verdict;

pub use checkpoint::CheckpointStore;
pub use node::Node;
pub use runner::{Orchestrator, RunOptions};
pub use verdict::classify;

use browser_adapter::AdapterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("run store error: {0}")]
    Store(#[from] run_store::StoreError),

    #[error("resume denied: {0}")]
    Resume(String),
}
