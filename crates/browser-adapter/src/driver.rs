//! The `PageDriver` seam
//!
//! One trait, two implementations: [`crate::ChromiumDriver`] against a live
//! page and [`crate::testkit::ScriptedPage`] against a scripted DOM model.
//! Discovery, the gate, the healer, and the executor are all written against
//! this trait and never see CDP.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AdapterError;

/// Everything a discovery tier wants to know about one interactive element.
///
/// The survey script synthesizes `selector` as a canonical locator that is
/// guaranteed to address exactly this element at survey time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementSummary {
    pub selector: String,
    pub tag: String,

    /// `type` attribute for inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aria_placeholder: Option<String>,

    /// `name` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,

    /// Explicit or implicit ARIA role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Computed accessible name (aria-label, labelledby, text content).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessible_name: Option<String>,

    /// data-test-id / data-testid / data-cy values keyed by attribute name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub test_ids: BTreeMap<String, String>,

    /// Text of an associated `<label for=id>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    pub visible: bool,
    pub enabled: bool,
}

/// Render-time state of a located element, as the gate sees it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementState {
    pub visible: bool,
    pub enabled: bool,
    /// Disabled via `aria-disabled` rather than the attribute.
    pub aria_disabled: bool,
    pub in_viewport: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn is_zero_area(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Largest per-coordinate delta to another box, in pixels.
    pub fn max_delta(&self, other: &BoundingBox) -> f64 {
        [
            (self.x - other.x).abs(),
            (self.y - other.y).abs(),
            (self.width - other.width).abs(),
            (self.height - other.height).abs(),
        ]
        .into_iter()
        .fold(0.0, f64::max)
    }
}

/// Primitive operations the engine needs from a live page.
///
/// All methods suspend; none panic on expected conditions. A missing
/// element is `Ok(None)` / `Ok(0)`, not an error — errors are driver
/// faults.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), AdapterError>;
    async fn current_url(&self) -> Result<String, AdapterError>;
    async fn title(&self) -> Result<String, AdapterError>;

    /// Survey interactive elements. `scope` is the accessible name of a
    /// container (dialog, form, section); when given, only elements inside
    /// the first matching container are returned, and an empty result may
    /// mean the container was not found — callers fall back to global.
    async fn survey(&self, scope: Option<&str>) -> Result<Vec<ElementSummary>, AdapterError>;

    async fn query_count(&self, selector: &str) -> Result<usize, AdapterError>;
    async fn element_state(&self, selector: &str) -> Result<Option<ElementState>, AdapterError>;
    async fn bounding_box(&self, selector: &str) -> Result<Option<BoundingBox>, AdapterError>;

    /// Whether the element addressed by `selector` sits inside a container
    /// whose accessible name matches `region`. Single-frame pages with no
    /// region expectation always pass.
    async fn in_scope(&self, _selector: &str, _region: &str) -> Result<bool, AdapterError> {
        Ok(true)
    }

    async fn click(&self, selector: &str) -> Result<(), AdapterError>;
    async fn fill(&self, selector: &str, value: &str) -> Result<(), AdapterError>;
    async fn type_text(
        &self,
        selector: &str,
        value: &str,
        key_delay: Duration,
    ) -> Result<(), AdapterError>;
    /// Press a key, on `selector` when given, otherwise on the focused
    /// element.
    async fn press(&self, selector: Option<&str>, key: &str) -> Result<(), AdapterError>;
    async fn select_option(&self, selector: &str, value: &str) -> Result<(), AdapterError>;
    async fn set_checked(&self, selector: &str, checked: bool) -> Result<(), AdapterError>;
    async fn hover(&self, selector: &str) -> Result<(), AdapterError>;
    async fn focus(&self, selector: &str) -> Result<(), AdapterError>;

    async fn inner_text(&self, selector: &str) -> Result<Option<String>, AdapterError>;
    async fn body_text(&self) -> Result<String, AdapterError>;
    async fn attribute(
        &self,
        selector: &str,
        name: &str,
    ) -> Result<Option<String>, AdapterError>;

    async fn eval(&self, script: &str) -> Result<Value, AdapterError>;
    async fn screenshot(&self) -> Result<Vec<u8>, AdapterError>;
    async fn html(&self) -> Result<String, AdapterError>;

    /// Structural skeleton of the DOM (tags + landmark attributes, no
    /// text), the input to drift fingerprinting.
    async fn dom_skeleton(&self) -> Result<String, AdapterError>;

    async fn bring_to_front(&self) -> Result<(), AdapterError>;
    async fn scroll_into_view(&self, selector: &str) -> Result<(), AdapterError>;
    async fn scroll_by(&self, dy: i64) -> Result<(), AdapterError>;

    /// Wait for the load event. `Ok(false)` on timeout.
    async fn wait_for_load(&self, timeout: Duration) -> Result<bool, AdapterError>;

    /// Wait until no network activity for `quiet`. `Ok(false)` on timeout;
    /// callers treat that as soft failure.
    async fn wait_network_idle(
        &self,
        quiet: Duration,
        timeout: Duration,
    ) -> Result<bool, AdapterError>;

    /// Sample DOM mutations over `window`, returning mutations/second.
    async fn mutation_rate(&self, window: Duration) -> Result<f64, AdapterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_delta_is_max_over_coordinates() {
        let a = BoundingBox {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 30.0,
        };
        let b = BoundingBox {
            x: 12.5,
            y: 20.0,
            width: 99.0,
            height: 30.0,
        };
        assert_eq!(a.max_delta(&b), 2.5);
        assert!(!a.is_zero_area());
        assert!(BoundingBox::default().is_zero_area());
    }
}
