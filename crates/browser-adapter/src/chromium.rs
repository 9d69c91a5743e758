//! Chromium-backed `PageDriver`
//!
//! One driver per page, one page per run. Interaction primitives prefer
//! trusted CDP input where chromiumoxide exposes it (clicks, keystrokes)
//! and fall back to injected probes for reads and value setting.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use serde_json::Value;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use crate::driver::{BoundingBox, ElementState, ElementSummary, PageDriver};
use crate::error::AdapterError;
use crate::js;
use crate::metrics;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct ChromiumDriver {
    page: Page,
    nav_timeout: Duration,
}

impl ChromiumDriver {
    pub fn new(page: Page, nav_timeout: Duration) -> Self {
        Self { page, nav_timeout }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    async fn eval_value(&self, script: &str) -> Result<Value, AdapterError> {
        metrics::probe_sent();
        let started = Instant::now();
        match self.page.evaluate(script).await {
            Ok(result) => {
                metrics::probe_ok(started.elapsed());
                Ok(result.into_value::<Value>().unwrap_or(Value::Null))
            }
            Err(err) => {
                metrics::probe_failed();
                Err(AdapterError::Eval(err.to_string()))
            }
        }
    }

    async fn eval_bool(&self, script: &str) -> Result<bool, AdapterError> {
        Ok(self.eval_value(script).await?.as_bool().unwrap_or(false))
    }

    /// Ordinal locators can't be handed to native element lookup; resolve
    /// them to a canonical CSS selector first.
    async fn resolve_css(&self, selector: &str) -> Result<String, AdapterError> {
        if !js::is_role_selector(selector) {
            return Ok(selector.to_string());
        }
        let value = self.eval_value(&js::canonicalize_script(selector)).await?;
        value
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| AdapterError::TargetNotFound {
                selector: selector.to_string(),
            })
    }

    pub async fn close(self) {
        if let Err(err) = self.page.close().await {
            warn!(error = %err, "page close failed");
        }
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn navigate(&self, url: &str, nav_timeout: Duration) -> Result<(), AdapterError> {
        let deadline = if nav_timeout.is_zero() {
            self.nav_timeout
        } else {
            nav_timeout
        };
        debug!(%url, timeout_ms = deadline.as_millis() as u64, "navigating");
        let nav = async {
            self.page
                .goto(url)
                .await
                .map_err(|e| AdapterError::Io(e.to_string()))?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|e| AdapterError::Io(e.to_string()))?;
            Ok::<(), AdapterError>(())
        };
        timeout(deadline, nav).await.map_err(|_| AdapterError::NavTimeout {
            url: url.to_string(),
            timeout_ms: deadline.as_millis() as u64,
        })?
    }

    async fn current_url(&self) -> Result<String, AdapterError> {
        self.page
            .url()
            .await
            .map_err(|e| AdapterError::Io(e.to_string()))?
            .ok_or_else(|| AdapterError::Internal("page has no url".to_string()))
    }

    async fn title(&self) -> Result<String, AdapterError> {
        Ok(self
            .page
            .get_title()
            .await
            .map_err(|e| AdapterError::Io(e.to_string()))?
            .unwrap_or_default())
    }

    async fn survey(&self, scope: Option<&str>) -> Result<Vec<ElementSummary>, AdapterError> {
        let value = self.eval_value(&js::survey_script(scope)).await?;
        serde_json::from_value(value).map_err(|e| AdapterError::Eval(e.to_string()))
    }

    async fn query_count(&self, selector: &str) -> Result<usize, AdapterError> {
        let value = self.eval_value(&js::query_count_script(selector)).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn element_state(&self, selector: &str) -> Result<Option<ElementState>, AdapterError> {
        let value = self.eval_value(&js::element_state_script(selector)).await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| AdapterError::Eval(e.to_string()))
    }

    async fn bounding_box(&self, selector: &str) -> Result<Option<BoundingBox>, AdapterError> {
        let value = self.eval_value(&js::bounding_box_script(selector)).await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| AdapterError::Eval(e.to_string()))
    }

    async fn in_scope(&self, selector: &str, region: &str) -> Result<bool, AdapterError> {
        self.eval_bool(&js::in_scope_script(selector, region)).await
    }

    async fn click(&self, selector: &str) -> Result<(), AdapterError> {
        let selector = self.resolve_css(selector).await?;
        let element = self
            .page
            .find_element(&selector)
            .await
            .map_err(|_| AdapterError::TargetNotFound {
                selector: selector.to_string(),
            })?;
        element
            .click()
            .await
            .map_err(|e| AdapterError::Io(e.to_string()))?;
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), AdapterError> {
        if !self.eval_bool(&js::fill_script(selector, value)).await? {
            return Err(AdapterError::TargetNotFound {
                selector: selector.to_string(),
            });
        }
        Ok(())
    }

    async fn type_text(
        &self,
        selector: &str,
        value: &str,
        key_delay: Duration,
    ) -> Result<(), AdapterError> {
        let selector = self.resolve_css(selector).await?;
        let element = self
            .page
            .find_element(&selector)
            .await
            .map_err(|_| AdapterError::TargetNotFound {
                selector: selector.to_string(),
            })?;
        element
            .focus()
            .await
            .map_err(|e| AdapterError::Io(e.to_string()))?;
        for ch in value.chars() {
            element
                .type_str(&ch.to_string())
                .await
                .map_err(|e| AdapterError::Io(e.to_string()))?;
            if !key_delay.is_zero() {
                sleep(key_delay).await;
            }
        }
        Ok(())
    }

    async fn press(&self, selector: Option<&str>, key: &str) -> Result<(), AdapterError> {
        if !self.eval_bool(&js::press_script(selector, key)).await? {
            return Err(AdapterError::TargetNotFound {
                selector: selector.unwrap_or("<focused>").to_string(),
            });
        }
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<(), AdapterError> {
        if !self
            .eval_bool(&js::select_option_script(selector, value))
            .await?
        {
            return Err(AdapterError::TargetNotFound {
                selector: selector.to_string(),
            });
        }
        Ok(())
    }

    async fn set_checked(&self, selector: &str, checked: bool) -> Result<(), AdapterError> {
        if !self
            .eval_bool(&js::set_checked_script(selector, checked))
            .await?
        {
            return Err(AdapterError::TargetNotFound {
                selector: selector.to_string(),
            });
        }
        Ok(())
    }

    async fn hover(&self, selector: &str) -> Result<(), AdapterError> {
        let selector = self.resolve_css(selector).await?;
        let element = self
            .page
            .find_element(&selector)
            .await
            .map_err(|_| AdapterError::TargetNotFound {
                selector: selector.to_string(),
            })?;
        element
            .hover()
            .await
            .map_err(|e| AdapterError::Io(e.to_string()))?;
        Ok(())
    }

    async fn focus(&self, selector: &str) -> Result<(), AdapterError> {
        let selector = self.resolve_css(selector).await?;
        let element = self
            .page
            .find_element(&selector)
            .await
            .map_err(|_| AdapterError::TargetNotFound {
                selector: selector.to_string(),
            })?;
        element
            .focus()
            .await
            .map_err(|e| AdapterError::Io(e.to_string()))?;
        Ok(())
    }

    async fn inner_text(&self, selector: &str) -> Result<Option<String>, AdapterError> {
        let value = self.eval_value(&js::inner_text_script(selector)).await?;
        Ok(value.as_str().map(|s| s.to_string()))
    }

    async fn body_text(&self) -> Result<String, AdapterError> {
        let value = self.eval_value(js::BODY_TEXT_SCRIPT).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(
        &self,
        selector: &str,
        name: &str,
    ) -> Result<Option<String>, AdapterError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); return el ? el.getAttribute({}) : null; }})()",
            serde_json::to_string(selector).unwrap_or_default(),
            serde_json::to_string(name).unwrap_or_default(),
        );
        let value = self.eval_value(&script).await?;
        Ok(value.as_str().map(|s| s.to_string()))
    }

    async fn eval(&self, script: &str) -> Result<Value, AdapterError> {
        self.eval_value(script).await
    }

    async fn screenshot(&self) -> Result<Vec<u8>, AdapterError> {
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build(),
            )
            .await
            .map_err(|e| AdapterError::Io(e.to_string()))
    }

    async fn html(&self) -> Result<String, AdapterError> {
        self.page
            .content()
            .await
            .map_err(|e| AdapterError::Io(e.to_string()))
    }

    async fn dom_skeleton(&self) -> Result<String, AdapterError> {
        let value = self.eval_value(js::DOM_SKELETON_SCRIPT).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn bring_to_front(&self) -> Result<(), AdapterError> {
        self.page
            .bring_to_front()
            .await
            .map_err(|e| AdapterError::Io(e.to_string()))?;
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<(), AdapterError> {
        self.eval_bool(&js::scroll_into_view_script(selector))
            .await?;
        Ok(())
    }

    async fn scroll_by(&self, dy: i64) -> Result<(), AdapterError> {
        self.eval_bool(&js::scroll_by_script(dy)).await?;
        Ok(())
    }

    async fn wait_for_load(&self, deadline: Duration) -> Result<bool, AdapterError> {
        let started = Instant::now();
        loop {
            let state = self.eval_value(js::READY_STATE_SCRIPT).await?;
            if state.as_str() == Some("complete") {
                return Ok(true);
            }
            if started.elapsed() >= deadline {
                return Ok(false);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_network_idle(
        &self,
        quiet: Duration,
        deadline: Duration,
    ) -> Result<bool, AdapterError> {
        let started = Instant::now();
        let mut last_count = self
            .eval_value(js::RESOURCE_COUNT_SCRIPT)
            .await?
            .as_u64()
            .unwrap_or(0);
        let mut quiet_since = Instant::now();
        loop {
            sleep(POLL_INTERVAL).await;
            let count = self
                .eval_value(js::RESOURCE_COUNT_SCRIPT)
                .await?
                .as_u64()
                .unwrap_or(0);
            if count != last_count {
                last_count = count;
                quiet_since = Instant::now();
            } else if quiet_since.elapsed() >= quiet {
                return Ok(true);
            }
            if started.elapsed() >= deadline {
                return Ok(false);
            }
        }
    }

    async fn mutation_rate(&self, window: Duration) -> Result<f64, AdapterError> {
        self.eval_value(js::MUTATION_INSTALL_SCRIPT).await?;
        sleep(window).await;
        let count = self
            .eval_value(js::MUTATION_READ_SCRIPT)
            .await?
            .as_u64()
            .unwrap_or(0);
        let secs = window.as_secs_f64().max(0.001);
        Ok(count as f64 / secs)
    }
}
