//! Adapter error surface

use thiserror::Error;

/// Faults raised by the browser layer. Expected step-level failures (gate
/// misses, discovery exhaustion) never travel through here; those are
/// `Failure` values. These are driver faults.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("navigation to {url} timed out after {timeout_ms}ms")]
    NavTimeout { url: String, timeout_ms: u64 },

    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("script evaluation failed: {0}")]
    Eval(String),

    #[error("element not found: {selector}")]
    TargetNotFound { selector: String },

    #[error("browser session lost: {0}")]
    Disconnected(String),

    #[error("cdp i/o failure: {0}")]
    Io(String),

    #[error("{0}")]
    Internal(String),
}

impl AdapterError {
    /// Whether retrying the same call can plausibly succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            AdapterError::NavTimeout { .. }
                | AdapterError::TargetNotFound { .. }
                | AdapterError::Io(_)
        )
    }

    /// Driver faults that should surface as `env_fault` in the RCA.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AdapterError::Launch(_) | AdapterError::Disconnected(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnects_are_fatal_timeouts_are_not() {
        assert!(AdapterError::Disconnected("gone".into()).is_fatal());
        assert!(!AdapterError::NavTimeout {
            url: "https://example.org".into(),
            timeout_ms: 1000
        }
        .is_fatal());
    }
}
