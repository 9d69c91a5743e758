//! Shared primitives for the webpilot execution engine
//!
//! Every crate in the workspace speaks these types: intents and plans on the
//! way in, run state while the orchestrator loops, run records on the way out.
//! Nothing here touches a browser; this crate stays dependency-light so leaf
//! crates can pull it without dragging the driver stack along.

pub mod config;
pub mod intent;
pub mod plan;
pub mod record;
pub mod state;
pub mod strategy;

pub use config::*;
pub use intent::*;
pub use plan::*;
pub use record::*;
pub use state::*;
pub use strategy::*;

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one engine run.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ReqId(pub String);

impl ReqId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ReqId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ReqId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier for one browser session (one context owned by one run).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
