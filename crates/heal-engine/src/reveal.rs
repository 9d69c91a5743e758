//! Reveal phase: make the target actionable without changing semantics

use std::time::Duration;

use browser_adapter::{AdapterError, PageDriver};
use tracing::debug;

/// Close-button shapes tried after Escape and backdrop click.
const CLOSE_SELECTORS: &[&str] = &[
    "[aria-label=\"Close\"]",
    "[aria-label=\"Dismiss\"]",
    "button.close",
    "[data-dismiss]",
];

const BACKDROP_SELECTORS: &[&str] = &[
    ".modal-backdrop",
    "[class*=\"overlay\"]",
    "[class*=\"backdrop\"]",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RevealReport {
    pub scrolled: bool,
    pub overlay_dismissed: bool,
    pub network_idle: bool,
}

pub struct Revealer {
    /// Incremental scroll distance for lazy-loading UIs.
    scroll_step: i64,
    scroll_rounds: u32,
    idle_quiet: Duration,
    idle_budget: Duration,
}

impl Default for Revealer {
    fn default() -> Self {
        Self {
            scroll_step: 400,
            scroll_rounds: 3,
            idle_quiet: Duration::from_millis(500),
            idle_budget: Duration::from_secs(3),
        }
    }
}

impl Revealer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the tab forward, scroll the target into view (with extra
    /// incremental scrolls for lazy-loaded content), dismiss overlays, and
    /// soft-wait for network idle.
    pub async fn reveal(
        &self,
        driver: &dyn PageDriver,
        selector: Option<&str>,
    ) -> Result<RevealReport, AdapterError> {
        let mut report = RevealReport::default();

        driver.bring_to_front().await?;

        match selector {
            Some(selector) => {
                driver.scroll_into_view(selector).await?;
                report.scrolled = true;
            }
            None => {
                for _ in 0..self.scroll_rounds {
                    driver.scroll_by(self.scroll_step).await?;
                }
                report.scrolled = true;
            }
        }

        report.overlay_dismissed = self.dismiss_overlays(driver).await?;

        // Bounded and soft: a busy page is not a reveal failure.
        report.network_idle = driver
            .wait_network_idle(self.idle_quiet, self.idle_budget)
            .await
            .unwrap_or(false);

        debug!(?report, "reveal finished");
        Ok(report)
    }

    /// Three strategies in order: Escape, backdrop click, close-button
    /// heuristic. Missing targets are expected, not errors.
    async fn dismiss_overlays(&self, driver: &dyn PageDriver) -> Result<bool, AdapterError> {
        driver.press(None, "Escape").await.ok();

        for selector in BACKDROP_SELECTORS {
            if driver.query_count(selector).await? > 0 {
                if driver.click(selector).await.is_ok() {
                    return Ok(true);
                }
            }
        }

        for selector in CLOSE_SELECTORS {
            if driver.query_count(selector).await? > 0 {
                if driver.click(selector).await.is_ok() {
                    return Ok(true);
                }
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use browser_adapter::testkit::{PerformedAction, ScriptedElement, ScriptedPage};

    #[tokio::test]
    async fn reveal_scrolls_target_and_dismisses_overlay() {
        let page = ScriptedPage::new("https://example.org").with_elements(vec![
            ScriptedElement::new("#lazy", "button").id("lazy").reveal_on_scroll(),
            ScriptedElement::new("#modal", "div").id("modal").overlay(),
        ]);

        let report = Revealer::new().reveal(&page, Some("#lazy")).await.unwrap();
        assert!(report.scrolled);

        let actions = page.actions();
        assert!(actions.contains(&PerformedAction::BringToFront));
        assert!(actions.contains(&PerformedAction::ScrollIntoView("#lazy".to_string())));
        // Escape removed the scripted overlay.
        assert_eq!(page.query_count("#modal").await.unwrap(), 0);
        assert_eq!(page.query_count("#lazy").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reveal_without_target_scrolls_incrementally() {
        let page = ScriptedPage::new("https://example.org");
        Revealer::new().reveal(&page, None).await.unwrap();
        let scrolls = page
            .actions()
            .iter()
            .filter(|a| matches!(a, PerformedAction::ScrollBy(_)))
            .count();
        assert_eq!(scrolls, 3);
    }
}
