//! Page readiness: profile detection plus the three-stage wait
//!
//! Applied before discovery on fresh navigations and on DYNAMIC targets.
//! Stage 1 waits for DOM idle (profile-dependent), stage 2 for the target
//! element when one is already known, stage 3 for an optional app-ready
//! hook.

pub mod gate;
pub mod profile;

pub use gate::{ReadinessConfig, ReadinessGate, ReadinessReport};
pub use profile::{classify_mutation_rate, ProfileDetector, MUTATION_RATE_THRESHOLD};
