//! Engine configuration
//!
//! Plain struct with serde + env resolution. The facade crate layers a
//! config file on top; leaf crates only ever see the resolved struct.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Runtime profile of a target page.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuntimeProfile {
    Static,
    Dynamic,
}

impl RuntimeProfile {
    pub fn name(&self) -> &'static str {
        match self {
            RuntimeProfile::Static => "STATIC",
            RuntimeProfile::Dynamic => "DYNAMIC",
        }
    }
}

/// Profile selection: fixed, or auto-detected from DOM mutation rate.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileSetting {
    #[default]
    Auto,
    Static,
    Dynamic,
}

impl ProfileSetting {
    pub fn fixed(&self) -> Option<RuntimeProfile> {
        match self {
            ProfileSetting::Auto => None,
            ProfileSetting::Static => Some(RuntimeProfile::Static),
            ProfileSetting::Dynamic => Some(RuntimeProfile::Dynamic),
        }
    }
}

/// Resolved engine configuration (spec'd keys plus engine-internal paths).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on heal attempts per step.
    pub max_heal_rounds: u32,

    /// Toggle for the selector cache and heal history.
    pub enable_memory: bool,

    /// Hot cache TTL in seconds.
    pub cache_ttl_hot_s: u64,

    /// Warm cache retention in days.
    pub cache_retention_warm_d: u64,

    /// DOM fingerprint drift fraction beyond which a cached selector is
    /// invalidated. At exactly the threshold the entry is reused.
    pub drift_threshold: f64,

    pub profile_default: ProfileSetting,

    /// Anti-detection patches applied before navigation.
    pub stealth: bool,

    /// Save/load browser storage between runs.
    pub persistent_profiles: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_dir: Option<PathBuf>,

    /// Concurrent run limit.
    pub max_parallel: usize,

    /// Root for sqlite stores, checkpoints, and artifacts.
    pub state_dir: PathBuf,

    /// Node-transition cap per run; exceeding it aborts with a fail verdict.
    pub max_transitions: u32,

    /// Headless browser launch.
    pub headless: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_heal_rounds: 3,
            enable_memory: true,
            cache_ttl_hot_s: 3600,
            cache_retention_warm_d: 7,
            drift_threshold: 0.35,
            profile_default: ProfileSetting::Auto,
            stealth: false,
            persistent_profiles: false,
            profile_dir: None,
            max_parallel: 4,
            state_dir: PathBuf::from(".webpilot"),
            max_transitions: 100,
            headless: true,
        }
    }
}

impl EngineConfig {
    /// Overlay recognized environment variables onto this config.
    pub fn apply_env<F>(mut self, get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get("MAX_HEAL_ROUNDS").and_then(|v| v.parse().ok()) {
            self.max_heal_rounds = v;
        }
        if let Some(v) = get("ENABLE_MEMORY").and_then(|v| parse_bool(&v)) {
            self.enable_memory = v;
        }
        if let Some(v) = get("CACHE_TTL_HOT_S").and_then(|v| v.parse().ok()) {
            self.cache_ttl_hot_s = v;
        }
        if let Some(v) = get("CACHE_RETENTION_WARM_D").and_then(|v| v.parse().ok()) {
            self.cache_retention_warm_d = v;
        }
        if let Some(v) = get("DRIFT_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.drift_threshold = v;
        }
        if let Some(v) = get("PROFILE_DEFAULT") {
            self.profile_default = match v.to_ascii_uppercase().as_str() {
                "STATIC" => ProfileSetting::Static,
                "DYNAMIC" => ProfileSetting::Dynamic,
                _ => ProfileSetting::Auto,
            };
        }
        if let Some(v) = get("STEALTH").and_then(|v| parse_bool(&v)) {
            self.stealth = v;
        }
        if let Some(v) = get("PERSISTENT_PROFILES").and_then(|v| parse_bool(&v)) {
            self.persistent_profiles = v;
        }
        if let Some(v) = get("PROFILE_DIR") {
            self.profile_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("MAX_PARALLEL").and_then(|v| v.parse().ok()) {
            self.max_parallel = v;
        }
        self
    }

    pub fn from_env() -> Self {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
