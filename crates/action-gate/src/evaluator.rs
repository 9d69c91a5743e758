//! Gate evaluation against a live page

use browser_adapter::{AdapterError, PageDriver};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};
use webpilot_core_types::Failure;

use crate::thresholds::GateThresholds;

/// The five checks, individually reported for telemetry and RCA evidence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GateChecks {
    pub unique: bool,
    pub visible: bool,
    pub enabled: bool,
    pub stable_bbox: bool,
    pub scoped: bool,
}

impl GateChecks {
    pub fn all_pass(&self) -> bool {
        self.unique && self.visible && self.enabled && self.stable_bbox && self.scoped
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GateOutcome {
    pub checks: GateChecks,
    /// `Failure::None` when the gate passed.
    pub failure: Failure,
    pub latency_ms: u64,
}

impl GateOutcome {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

pub struct GateEvaluator;

impl GateEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate all five points for `selector`, with thresholds scaled to
    /// the current heal round. The whole evaluation runs under the round's
    /// timeout budget; exceeding it is a `timeout` failure, not an error.
    pub async fn evaluate(
        &self,
        driver: &dyn PageDriver,
        selector: &str,
        region: Option<&str>,
        heal_round: u32,
    ) -> Result<GateOutcome, AdapterError> {
        let thresholds = GateThresholds::for_round(heal_round);
        let started = std::time::Instant::now();

        let evaluation = self.evaluate_inner(driver, selector, region, &thresholds);
        let (checks, failure) = match timeout(thresholds.timeout, evaluation).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(selector, "gate evaluation exceeded its budget");
                (GateChecks::default(), Failure::Timeout)
            }
        };

        telemetry::gate(
            checks.unique,
            checks.visible,
            checks.enabled,
            checks.stable_bbox,
            checks.scoped,
        );

        Ok(GateOutcome {
            checks,
            failure,
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn evaluate_inner(
        &self,
        driver: &dyn PageDriver,
        selector: &str,
        region: Option<&str>,
        thresholds: &GateThresholds,
    ) -> Result<(GateChecks, Failure), AdapterError> {
        let mut checks = GateChecks::default();

        // Point 1: uniqueness. Zero matches means the element is gone
        // entirely, which the healer treats as a timeout, not ambiguity.
        let count = driver.query_count(selector).await?;
        if count == 0 {
            debug!(selector, "no element matches");
            return Ok((checks, Failure::Timeout));
        }
        if count > 1 {
            debug!(selector, count, "selector is ambiguous");
            return Ok((checks, Failure::NotUnique));
        }
        checks.unique = true;

        // Points 2 and 3: rendered and interactable.
        let Some(state) = driver.element_state(selector).await? else {
            return Ok((checks, Failure::Timeout));
        };
        if !state.visible {
            return Ok((checks, Failure::NotVisible));
        }
        checks.visible = true;

        if !state.enabled || state.aria_disabled {
            return Ok((checks, Failure::Disabled));
        }
        checks.enabled = true;

        // Point 4: bounding-box stability across N samples.
        if !self.bbox_stable(driver, selector, thresholds).await? {
            return Ok((checks, Failure::Unstable));
        }
        checks.stable_bbox = true;

        // Point 5: expected scope. Single-frame runs without a region
        // expectation always pass; a region mismatch surfaces as timeout.
        checks.scoped = match region {
            Some(region) => driver.in_scope(selector, region).await?,
            None => true,
        };
        if !checks.scoped {
            return Ok((checks, Failure::Timeout));
        }

        Ok((checks, Failure::None))
    }

    async fn bbox_stable(
        &self,
        driver: &dyn PageDriver,
        selector: &str,
        thresholds: &GateThresholds,
    ) -> Result<bool, AdapterError> {
        let mut previous = match driver.bounding_box(selector).await? {
            Some(bbox) if !bbox.is_zero_area() => bbox,
            _ => return Ok(false),
        };
        for _ in 1..thresholds.samples {
            sleep(thresholds.sample_delay).await;
            let Some(current) = driver.bounding_box(selector).await? else {
                return Ok(false);
            };
            if current.max_delta(&previous) > thresholds.tolerance_px {
                debug!(
                    selector,
                    delta = current.max_delta(&previous),
                    tolerance = thresholds.tolerance_px,
                    "bbox still moving"
                );
                return Ok(false);
            }
            previous = current;
        }
        Ok(true)
    }
}

impl Default for GateEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use browser_adapter::testkit::{ScriptedElement, ScriptedPage};
    use browser_adapter::BoundingBox;

    fn bbox(x: f64) -> BoundingBox {
        BoundingBox {
            x,
            y: 10.0,
            width: 100.0,
            height: 30.0,
        }
    }

    #[tokio::test]
    async fn passes_on_a_clean_element() {
        let page = ScriptedPage::new("https://example.org").with_elements(vec![
            ScriptedElement::new("#save", "button").id("save").role("button"),
        ]);
        let outcome = GateEvaluator::new()
            .evaluate(&page, "#save", None, 0)
            .await
            .unwrap();
        assert!(outcome.passed());
        assert!(outcome.checks.all_pass());
    }

    #[tokio::test]
    async fn ambiguous_selector_is_not_unique() {
        let page = ScriptedPage::new("https://example.org").with_elements(vec![
            ScriptedElement::new("#a", "button").name("save"),
            ScriptedElement::new("#b", "button").name("save"),
        ]);
        let outcome = GateEvaluator::new()
            .evaluate(&page, "[name=\"save\"]", None, 0)
            .await
            .unwrap();
        assert_eq!(outcome.failure, Failure::NotUnique);
        assert!(!outcome.checks.unique);
    }

    #[tokio::test]
    async fn vanished_selector_is_a_timeout() {
        let page = ScriptedPage::new("https://example.org");
        let outcome = GateEvaluator::new()
            .evaluate(&page, "#input-339", None, 0)
            .await
            .unwrap();
        assert_eq!(outcome.failure, Failure::Timeout);
    }

    #[tokio::test]
    async fn hidden_and_disabled_map_to_their_failures() {
        let page = ScriptedPage::new("https://example.org").with_elements(vec![
            ScriptedElement::new("#hidden", "button").id("hidden").hidden(),
            ScriptedElement::new("#off", "button").id("off").disabled(),
            ScriptedElement::new("#aria-off", "button").id("aria-off").aria_disabled(),
        ]);
        let evaluator = GateEvaluator::new();
        assert_eq!(
            evaluator.evaluate(&page, "#hidden", None, 0).await.unwrap().failure,
            Failure::NotVisible
        );
        assert_eq!(
            evaluator.evaluate(&page, "#off", None, 0).await.unwrap().failure,
            Failure::Disabled
        );
        assert_eq!(
            evaluator.evaluate(&page, "#aria-off", None, 0).await.unwrap().failure,
            Failure::Disabled
        );
    }

    #[tokio::test]
    async fn animation_fails_then_relaxed_round_passes() {
        // Element slides 5px between the first two samples.
        let frames = vec![bbox(0.0), bbox(5.0), bbox(5.0), bbox(5.0), bbox(5.0)];
        let page = ScriptedPage::new("https://example.org").with_elements(vec![
            ScriptedElement::new("#slide", "button").id("slide").bbox_frames(frames),
        ]);
        let evaluator = GateEvaluator::new();

        let strict = evaluator.evaluate(&page, "#slide", None, 0).await.unwrap();
        assert_eq!(strict.failure, Failure::Unstable);

        // Round 6 tolerance is 5.0px, which absorbs the settled motion.
        let relaxed = evaluator.evaluate(&page, "#slide", None, 6).await.unwrap();
        assert!(relaxed.passed());
    }

    #[tokio::test]
    async fn region_mismatch_fails_scoped() {
        let page = ScriptedPage::new("https://example.org").with_elements(vec![
            ScriptedElement::new("#amount", "input")
                .id("amount")
                .region_name("New Account"),
        ]);
        let evaluator = GateEvaluator::new();

        let ok = evaluator
            .evaluate(&page, "#amount", Some("New Account"), 0)
            .await
            .unwrap();
        assert!(ok.passed());

        let wrong = evaluator
            .evaluate(&page, "#amount", Some("App Launcher"), 0)
            .await
            .unwrap();
        assert_eq!(wrong.failure, Failure::Timeout);
        assert!(!wrong.checks.scoped);
    }
}
