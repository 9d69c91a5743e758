//! App-specific adapter seam
//!
//! Frameworks with custom widgets (combobox pickers, media grids) get
//! their own resolvers, registered by site or widget fingerprint. An
//! adapter both resolves candidates and knows how to act on them; the
//! five-point gate still runs afterwards.

use std::sync::Arc;

use async_trait::async_trait;
use browser_adapter::{AdapterError, PageDriver};
use webpilot_core_types::{ActionKind, Candidate, Intent};

/// Outcome of an adapter-performed action.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecResult {
    pub completed: bool,
    /// Adapter-declared success indicator that fired (e.g. widget closed).
    pub indicator: Option<String>,
}

impl ExecResult {
    pub fn completed(indicator: impl Into<String>) -> Self {
        Self {
            completed: true,
            indicator: Some(indicator.into()),
        }
    }

    pub fn incomplete() -> Self {
        Self::default()
    }
}

#[async_trait]
pub trait AppAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this adapter claims the intent on this page.
    fn supports(&self, intent: &Intent, url: &str) -> bool;

    /// Ordered candidate list, best first. The adapter declares its own
    /// fallback order.
    async fn resolve(
        &self,
        driver: &dyn PageDriver,
        intent: &Intent,
    ) -> Result<Vec<Candidate>, AdapterError>;

    /// Perform the action with widget-specific choreography.
    async fn act(
        &self,
        driver: &dyn PageDriver,
        candidate: &Candidate,
        action: ActionKind,
        value: Option<&str>,
    ) -> Result<ExecResult, AdapterError>;
}

/// Registered adapters, probed in registration order.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn AppAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn AppAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn find(&self, intent: &Intent, url: &str) -> Option<Arc<dyn AppAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.supports(intent, url))
            .cloned()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn AppAdapter>> {
        self.adapters.iter().find(|a| a.name() == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
