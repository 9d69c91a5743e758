//! Three-stage readiness wait

use std::time::Duration;

use browser_adapter::{AdapterError, PageDriver};
use tokio::time::{sleep, Instant};
use tracing::debug;
use webpilot_core_types::RuntimeProfile;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Clone, Debug)]
pub struct ReadinessConfig {
    /// Stage 1 budget.
    pub dom_idle_timeout: Duration,
    /// Network-quiet window for STATIC pages.
    pub quiet_window: Duration,
    /// Stage 2 budget.
    pub element_timeout: Duration,
    /// Optional stage 3 probe; must evaluate to a boolean.
    pub app_ready_script: Option<String>,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            dom_idle_timeout: Duration::from_secs(8),
            quiet_window: Duration::from_millis(500),
            element_timeout: Duration::from_secs(10),
            app_ready_script: None,
        }
    }
}

/// Outcome of the three stages. Only a missing element is a hard stop;
/// idle and hook misses are soft.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadinessReport {
    pub dom_idle: bool,
    pub element_visible: bool,
    pub app_ready: bool,
}

impl ReadinessReport {
    pub fn is_ready(&self) -> bool {
        self.element_visible
    }
}

pub struct ReadinessGate {
    config: ReadinessConfig,
}

impl ReadinessGate {
    pub fn new(config: ReadinessConfig) -> Self {
        Self { config }
    }

    /// Run the staged wait. `selector` is the already-known target when a
    /// cached or planned selector exists; stage 2 is skipped without one.
    pub async fn wait(
        &self,
        driver: &dyn PageDriver,
        profile: RuntimeProfile,
        selector: Option<&str>,
    ) -> Result<ReadinessReport, AdapterError> {
        let mut report = ReadinessReport::default();

        // Stage 1: DOM idle.
        report.dom_idle = match profile {
            RuntimeProfile::Static => {
                driver
                    .wait_network_idle(self.config.quiet_window, self.config.dom_idle_timeout)
                    .await?
            }
            RuntimeProfile::Dynamic => driver.wait_for_load(self.config.dom_idle_timeout).await?,
        };
        telemetry::readiness(
            1,
            if report.dom_idle { "ok" } else { "soft_timeout" },
            profile.name(),
        );

        // Stage 2: element visible, when a selector is already known.
        match selector {
            Some(selector) => {
                report.element_visible = self.wait_element_visible(driver, selector).await?;
                telemetry::readiness(
                    2,
                    if report.element_visible { "ok" } else { "timeout" },
                    selector,
                );
            }
            None => {
                report.element_visible = true;
                telemetry::readiness(2, "skipped", "no selector yet");
            }
        }

        // Stage 3: app-ready hook.
        report.app_ready = match &self.config.app_ready_script {
            Some(script) => {
                let ready = driver
                    .eval(script)
                    .await
                    .map(|v| v.as_bool().unwrap_or(false))
                    .unwrap_or(false);
                telemetry::readiness(3, if ready { "ok" } else { "soft_timeout" }, "app hook");
                ready
            }
            None => {
                telemetry::readiness(3, "skipped", "no hook");
                true
            }
        };

        debug!(?report, "readiness gate finished");
        Ok(report)
    }

    async fn wait_element_visible(
        &self,
        driver: &dyn PageDriver,
        selector: &str,
    ) -> Result<bool, AdapterError> {
        let started = Instant::now();
        loop {
            if let Some(state) = driver.element_state(selector).await? {
                if state.visible {
                    return Ok(true);
                }
            }
            if started.elapsed() >= self.config.element_timeout {
                return Ok(false);
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use browser_adapter::testkit::{ScriptedElement, ScriptedPage};

    fn fast_config() -> ReadinessConfig {
        ReadinessConfig {
            dom_idle_timeout: Duration::from_millis(50),
            quiet_window: Duration::from_millis(10),
            element_timeout: Duration::from_millis(100),
            app_ready_script: None,
        }
    }

    #[tokio::test]
    async fn ready_when_element_is_visible() {
        let page = ScriptedPage::new("https://en.wikipedia.org").with_elements(vec![
            ScriptedElement::new("input[name=\"search\"]", "input").name("search"),
        ]);
        let gate = ReadinessGate::new(fast_config());
        let report = gate
            .wait(&page, RuntimeProfile::Static, Some("input[name=\"search\"]"))
            .await
            .unwrap();
        assert!(report.is_ready());
        assert!(report.dom_idle);
    }

    #[tokio::test]
    async fn missing_element_times_out_stage_two() {
        let page = ScriptedPage::new("https://en.wikipedia.org");
        let gate = ReadinessGate::new(fast_config());
        let report = gate
            .wait(&page, RuntimeProfile::Static, Some("#gone"))
            .await
            .unwrap();
        assert!(!report.is_ready());
    }

    #[tokio::test]
    async fn no_selector_skips_stage_two() {
        let page = ScriptedPage::new("https://en.wikipedia.org");
        let gate = ReadinessGate::new(fast_config());
        let report = gate.wait(&page, RuntimeProfile::Dynamic, None).await.unwrap();
        assert!(report.is_ready());
    }
}
