//! WebPilot engine facade
//!
//! Shells (CLI, services) call `Engine::run(request) -> RunRecord` and
//! `stream_logs()`. Everything else — discovery, gating, healing, caching,
//! persistence — is wired here from the workspace crates and driven by
//! one [`EngineConfig`].

pub mod config;
pub mod engine;

pub use config::load_config;
pub use engine::{Engine, EngineError};

pub use telemetry::subscribe as stream_logs;
pub use templating::Dataset;
pub use webpilot_core_types::{
    ActionKind, EngineConfig, Intent, ReqId, RunRecord, RunRequest, Verdict,
};

/// Initialize tracing for embedded use. Binaries call this once.
pub fn init_telemetry(json: bool) {
    telemetry::init(json);
}
