//! Autocomplete combobox adapter
//!
//! SPA pickers (Salesforce-style comboboxes) reject plain `select`: the
//! widget wants a click to open, typed prefix with debounce, then Enter.
//! Success indicator is the widget reporting `aria-expanded=false`.
//! Fallbacks: the aria-controls listbox by option name, then pure
//! keyboard navigation.

use std::time::Duration;

use async_trait::async_trait;
use browser_adapter::{AdapterError, PageDriver};
use discovery_ladder::{AppAdapter, ExecResult};
use tokio::time::sleep;
use tracing::debug;
use webpilot_core_types::{ActionKind, Candidate, Intent, StrategyKind};

const KEY_DELAY: Duration = Duration::from_millis(40);
const DEBOUNCE: Duration = Duration::from_millis(350);

pub struct AutocompleteCombobox {
    /// URL fragments of sites whose pickers need this choreography.
    site_patterns: Vec<String>,
}

impl Default for AutocompleteCombobox {
    fn default() -> Self {
        Self {
            site_patterns: vec![
                "lightning.force.com".to_string(),
                "salesforce.com".to_string(),
            ],
        }
    }
}

impl AutocompleteCombobox {
    pub fn with_patterns(patterns: Vec<String>) -> Self {
        Self {
            site_patterns: patterns,
        }
    }

    fn strategy() -> StrategyKind {
        StrategyKind::AppAdapter("autocomplete_first_option".to_string())
    }
}

#[async_trait]
impl AppAdapter for AutocompleteCombobox {
    fn name(&self) -> &str {
        "autocomplete_first_option"
    }

    fn supports(&self, intent: &Intent, url: &str) -> bool {
        intent.action == ActionKind::Select
            && self.site_patterns.iter().any(|p| url.contains(p.as_str()))
    }

    async fn resolve(
        &self,
        driver: &dyn PageDriver,
        intent: &Intent,
    ) -> Result<Vec<Candidate>, AdapterError> {
        let summaries = driver.survey(intent.within.as_deref()).await?;
        let target = intent.element.to_lowercase();
        Ok(summaries
            .iter()
            .filter(|s| s.role.as_deref() == Some("combobox"))
            .filter(|s| {
                [
                    s.aria_label.as_deref(),
                    s.accessible_name.as_deref(),
                    s.label_text.as_deref(),
                ]
                .into_iter()
                .flatten()
                .any(|label| label.to_lowercase().starts_with(&target))
            })
            .map(|s| {
                Candidate::new(s.selector.clone(), Self::strategy())
                    .with_meta(serde_json::json!({ "widget": "combobox" }))
            })
            .collect())
    }

    async fn act(
        &self,
        driver: &dyn PageDriver,
        candidate: &Candidate,
        _action: ActionKind,
        value: Option<&str>,
    ) -> Result<ExecResult, AdapterError> {
        let Some(value) = value else {
            return Ok(ExecResult::incomplete());
        };
        let selector = candidate.selector.as_str();

        // Primary: open, type ahead with debounce, Enter.
        driver.click(selector).await?;
        driver.type_text(selector, value, KEY_DELAY).await?;
        sleep(DEBOUNCE).await;
        driver.press(Some(selector), "Enter").await?;

        if self.widget_closed(driver, selector).await? {
            return Ok(ExecResult::completed("aria-expanded=false"));
        }

        // Fallback 1: pick the option from the aria-controls listbox.
        debug!(selector, "type-ahead left the widget open, trying listbox option");
        let option_selector = format!("[role=\"option\"][aria-label=\"{value}\"]");
        if driver.query_count(&option_selector).await? == 1 {
            driver.click(&option_selector).await?;
            if self.widget_closed(driver, selector).await? {
                return Ok(ExecResult::completed("listbox option clicked"));
            }
        }

        // Fallback 2: keyboard navigation.
        debug!(selector, "falling back to keyboard navigation");
        driver.press(Some(selector), "ArrowDown").await?;
        driver.press(Some(selector), "Enter").await?;
        if self.widget_closed(driver, selector).await? {
            return Ok(ExecResult::completed("keyboard navigation"));
        }

        Ok(ExecResult::incomplete())
    }
}

impl AutocompleteCombobox {
    async fn widget_closed(
        &self,
        driver: &dyn PageDriver,
        selector: &str,
    ) -> Result<bool, AdapterError> {
        let expanded = driver.attribute(selector, "aria-expanded").await?;
        // Absent attribute counts as closed; widgets remove it on commit.
        Ok(expanded.as_deref() != Some("true"))
    }
}
