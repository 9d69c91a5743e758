//! Multi-tier selector discovery
//!
//! Eight strategies ordered stability-first, an ordinal strategy for "the
//! first video", app-specific adapters for framework widgets, and scoped
//! search inside named containers. Every candidate clears a six-layer
//! false-positive screen before it is returned; the first tier whose
//! candidate survives wins.

pub mod adapter;
pub mod ladder;
pub mod matching;
pub mod service;
pub mod tiers;

pub use adapter::{AdapterRegistry, AppAdapter, ExecResult};
pub use ladder::{DiscoveryLadder, DiscoveryOutcome, LadderOptions};
pub use service::DiscoveryService;
