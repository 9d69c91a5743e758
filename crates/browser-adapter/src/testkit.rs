//! Scripted page double for driver-level tests
//!
//! Models a page as a list of element summaries plus a little scripted
//! behavior (overlays dismissed by Escape, elements revealed by scrolling,
//! bounding boxes that settle frame by frame). Implements the same selector
//! dialect as the real probes: CSS attribute forms, `#id`, and
//! `role=ROLE >> nth=N`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::driver::{BoundingBox, ElementState, ElementSummary, PageDriver};
use crate::error::AdapterError;

/// One element in the scripted DOM.
#[derive(Clone, Debug)]
pub struct ScriptedElement {
    pub summary: ElementSummary,
    pub state: ElementState,
    /// Successive bbox samples; the last repeats forever.
    pub bbox_frames: Vec<BoundingBox>,
    /// Accessible name of the container this element sits in.
    pub region: Option<String>,
    /// Removed when Escape is pressed.
    pub overlay: bool,
    /// Becomes visible after a scroll reaches it.
    pub visible_after_scroll: bool,
}

impl ScriptedElement {
    pub fn new(selector: impl Into<String>, tag: impl Into<String>) -> Self {
        let selector = selector.into();
        Self {
            summary: ElementSummary {
                selector,
                tag: tag.into(),
                visible: true,
                enabled: true,
                ..ElementSummary::default()
            },
            state: ElementState {
                visible: true,
                enabled: true,
                aria_disabled: false,
                in_viewport: true,
            },
            bbox_frames: vec![BoundingBox {
                x: 10.0,
                y: 10.0,
                width: 120.0,
                height: 32.0,
            }],
            region: None,
            overlay: false,
            visible_after_scroll: false,
        }
    }

    pub fn aria_label(mut self, label: &str) -> Self {
        self.summary.aria_label = Some(label.to_string());
        self.summary.accessible_name = Some(label.to_string());
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.summary.name = Some(name.to_string());
        self
    }

    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.summary.placeholder = Some(placeholder.to_string());
        self
    }

    pub fn aria_placeholder(mut self, value: &str) -> Self {
        self.summary.aria_placeholder = Some(value.to_string());
        self
    }

    pub fn id(mut self, id: &str) -> Self {
        self.summary.id = Some(id.to_string());
        self
    }

    pub fn role(mut self, role: &str) -> Self {
        self.summary.role = Some(role.to_string());
        self
    }

    pub fn accessible_name(mut self, name: &str) -> Self {
        self.summary.accessible_name = Some(name.to_string());
        self
    }

    pub fn label_text(mut self, text: &str) -> Self {
        self.summary.label_text = Some(text.to_string());
        self
    }

    pub fn test_id(mut self, attr: &str, value: &str) -> Self {
        self.summary.test_ids.insert(attr.to_string(), value.to_string());
        self
    }

    pub fn input_type(mut self, t: &str) -> Self {
        self.summary.input_type = Some(t.to_string());
        self
    }

    pub fn classes(mut self, classes: &[&str]) -> Self {
        self.summary.classes = classes.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.summary.text = Some(text.to_string());
        self
    }

    pub fn region_name(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.summary.visible = false;
        self.state.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.summary.enabled = false;
        self.state.enabled = false;
        self
    }

    pub fn aria_disabled(mut self) -> Self {
        self.state.aria_disabled = true;
        self
    }

    pub fn overlay(mut self) -> Self {
        self.overlay = true;
        self
    }

    pub fn reveal_on_scroll(mut self) -> Self {
        self.visible_after_scroll = true;
        self.summary.visible = false;
        self.state.visible = false;
        self
    }

    pub fn bbox_frames(mut self, frames: Vec<BoundingBox>) -> Self {
        self.bbox_frames = frames;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PerformedAction {
    Navigate(String),
    Click(String),
    Fill { selector: String, value: String },
    Type { selector: String, value: String },
    Press { selector: Option<String>, key: String },
    Select { selector: String, value: String },
    SetChecked { selector: String, checked: bool },
    Hover(String),
    Focus(String),
    ScrollIntoView(String),
    ScrollBy(i64),
    BringToFront,
    Screenshot,
}

struct Model {
    url: String,
    title: String,
    body_text: String,
    html: String,
    skeleton: String,
    mutation_rate: f64,
    network_idle: bool,
    loaded: bool,
    elements: Vec<ScriptedElement>,
    bbox_cursors: HashMap<String, usize>,
    actions: Vec<PerformedAction>,
}

/// The scripted double. Share it as `Arc<ScriptedPage>` and hand the same
/// instance to the code under test and to assertions.
pub struct ScriptedPage {
    inner: Mutex<Model>,
}

impl ScriptedPage {
    pub fn new(url: &str) -> Self {
        Self {
            inner: Mutex::new(Model {
                url: url.to_string(),
                title: String::new(),
                body_text: String::new(),
                html: "<html><body></body></html>".to_string(),
                skeleton: "html|body".to_string(),
                mutation_rate: 0.0,
                network_idle: true,
                loaded: true,
                elements: Vec::new(),
                bbox_cursors: HashMap::new(),
                actions: Vec::new(),
            }),
        }
    }

    pub fn with_elements(self, elements: Vec<ScriptedElement>) -> Self {
        self.inner.lock().elements = elements;
        self
    }

    pub fn with_title(self, title: &str) -> Self {
        self.inner.lock().title = title.to_string();
        self
    }

    pub fn with_body_text(self, text: &str) -> Self {
        self.inner.lock().body_text = text.to_string();
        self
    }

    pub fn with_skeleton(self, skeleton: &str) -> Self {
        self.inner.lock().skeleton = skeleton.to_string();
        self
    }

    pub fn with_mutation_rate(self, rate: f64) -> Self {
        self.inner.lock().mutation_rate = rate;
        self
    }

    // Test-side mutation handles.

    pub fn set_url(&self, url: &str) {
        self.inner.lock().url = url.to_string();
    }

    pub fn set_skeleton(&self, skeleton: &str) {
        self.inner.lock().skeleton = skeleton.to_string();
    }

    pub fn add_element(&self, element: ScriptedElement) {
        self.inner.lock().elements.push(element);
    }

    pub fn remove_element(&self, selector: &str) {
        self.inner
            .lock()
            .elements
            .retain(|e| e.summary.selector != selector);
    }

    pub fn set_visible(&self, selector: &str, visible: bool) {
        let mut model = self.inner.lock();
        for element in &mut model.elements {
            if element.summary.selector == selector {
                element.summary.visible = visible;
                element.state.visible = visible;
            }
        }
    }

    pub fn actions(&self) -> Vec<PerformedAction> {
        self.inner.lock().actions.clone()
    }

    fn matching_indices(model: &Model, selector: &str) -> Vec<usize> {
        if let Some(rest) = selector.strip_prefix("role=") {
            if let Some((role, nth)) = parse_role_nth(rest) {
                let family: Vec<usize> = model
                    .elements
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| {
                        e.summary.visible && e.summary.role.as_deref() == Some(role.as_str())
                    })
                    .map(|(i, _)| i)
                    .collect();
                return family.get(nth).map(|i| vec![*i]).unwrap_or_default();
            }
            return Vec::new();
        }
        model
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| css_matches(&e.summary, selector))
            .map(|(i, _)| i)
            .collect()
    }

    fn record(&self, action: PerformedAction) {
        self.inner.lock().actions.push(action);
    }

    fn require_match(&self, selector: &str) -> Result<(), AdapterError> {
        let model = self.inner.lock();
        if Self::matching_indices(&model, selector).is_empty() {
            return Err(AdapterError::TargetNotFound {
                selector: selector.to_string(),
            });
        }
        Ok(())
    }
}

fn parse_role_nth(rest: &str) -> Option<(String, usize)> {
    let (role, nth_part) = rest.split_once(">>")?;
    let nth = nth_part.trim().strip_prefix("nth=")?.parse().ok()?;
    Some((role.trim().to_string(), nth))
}

/// Attribute-form CSS matcher covering the selector shapes the engine
/// generates: `#id`, `[attr="value"]`, `tag[attr="value"]`, plus exact
/// equality with the canonical selector.
fn css_matches(summary: &ElementSummary, selector: &str) -> bool {
    if summary.selector == selector {
        return true;
    }
    if let Some(id) = selector.strip_prefix('#') {
        return summary.id.as_deref() == Some(id);
    }
    let (tag, attr_part) = match selector.find('[') {
        Some(0) => (None, &selector[..]),
        Some(pos) => (Some(&selector[..pos]), &selector[pos..]),
        None => return false,
    };
    if let Some(tag) = tag {
        if !tag.is_empty() && summary.tag != tag {
            return false;
        }
    }
    let inner = attr_part.trim_start_matches('[').trim_end_matches(']');
    let Some((attr, raw_value)) = inner.split_once('=') else {
        return false;
    };
    let value = raw_value.trim_matches('"');
    match attr {
        "aria-label" => summary.aria_label.as_deref() == Some(value),
        "aria-placeholder" => summary.aria_placeholder.as_deref() == Some(value),
        "name" => summary.name.as_deref() == Some(value),
        "placeholder" => summary.placeholder.as_deref() == Some(value),
        "id" => summary.id.as_deref() == Some(value),
        "type" => summary.input_type.as_deref() == Some(value),
        "data-testid" | "data-test-id" | "data-cy" => {
            summary.test_ids.get(attr).map(|v| v.as_str()) == Some(value)
        }
        _ => false,
    }
}

#[async_trait]
impl PageDriver for ScriptedPage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), AdapterError> {
        let mut model = self.inner.lock();
        model.url = url.to_string();
        model.actions.push(PerformedAction::Navigate(url.to_string()));
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AdapterError> {
        Ok(self.inner.lock().url.clone())
    }

    async fn title(&self) -> Result<String, AdapterError> {
        Ok(self.inner.lock().title.clone())
    }

    async fn survey(&self, scope: Option<&str>) -> Result<Vec<ElementSummary>, AdapterError> {
        let model = self.inner.lock();
        let summaries = model
            .elements
            .iter()
            .filter(|e| match scope {
                Some(region) => e
                    .region
                    .as_deref()
                    .map(|r| r.to_lowercase().contains(&region.to_lowercase()))
                    .unwrap_or(false),
                None => true,
            })
            .map(|e| e.summary.clone())
            .collect();
        Ok(summaries)
    }

    async fn query_count(&self, selector: &str) -> Result<usize, AdapterError> {
        let model = self.inner.lock();
        Ok(Self::matching_indices(&model, selector).len())
    }

    async fn element_state(&self, selector: &str) -> Result<Option<ElementState>, AdapterError> {
        let model = self.inner.lock();
        Ok(Self::matching_indices(&model, selector)
            .first()
            .map(|&i| model.elements[i].state))
    }

    async fn bounding_box(&self, selector: &str) -> Result<Option<BoundingBox>, AdapterError> {
        let mut model = self.inner.lock();
        let Some(&idx) = Self::matching_indices(&model, selector).first() else {
            return Ok(None);
        };
        let cursor = *model
            .bbox_cursors
            .entry(selector.to_string())
            .and_modify(|c| *c += 1)
            .or_insert(0);
        let frames = &model.elements[idx].bbox_frames;
        let frame = frames
            .get(cursor)
            .or_else(|| frames.last())
            .copied()
            .unwrap_or_default();
        Ok(Some(frame))
    }

    async fn in_scope(&self, selector: &str, region: &str) -> Result<bool, AdapterError> {
        let model = self.inner.lock();
        Ok(Self::matching_indices(&model, selector)
            .first()
            .map(|&i| {
                model.elements[i]
                    .region
                    .as_deref()
                    .map(|r| r.to_lowercase().contains(&region.to_lowercase()))
                    .unwrap_or(false)
            })
            .unwrap_or(false))
    }

    async fn click(&self, selector: &str) -> Result<(), AdapterError> {
        self.require_match(selector)?;
        self.record(PerformedAction::Click(selector.to_string()));
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), AdapterError> {
        self.require_match(selector)?;
        self.record(PerformedAction::Fill {
            selector: selector.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    async fn type_text(
        &self,
        selector: &str,
        value: &str,
        _key_delay: Duration,
    ) -> Result<(), AdapterError> {
        self.require_match(selector)?;
        self.record(PerformedAction::Type {
            selector: selector.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    async fn press(&self, selector: Option<&str>, key: &str) -> Result<(), AdapterError> {
        if let Some(selector) = selector {
            self.require_match(selector)?;
        }
        if key == "Escape" {
            self.inner.lock().elements.retain(|e| !e.overlay);
        }
        self.record(PerformedAction::Press {
            selector: selector.map(|s| s.to_string()),
            key: key.to_string(),
        });
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<(), AdapterError> {
        self.require_match(selector)?;
        self.record(PerformedAction::Select {
            selector: selector.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    async fn set_checked(&self, selector: &str, checked: bool) -> Result<(), AdapterError> {
        self.require_match(selector)?;
        self.record(PerformedAction::SetChecked {
            selector: selector.to_string(),
            checked,
        });
        Ok(())
    }

    async fn hover(&self, selector: &str) -> Result<(), AdapterError> {
        self.require_match(selector)?;
        self.record(PerformedAction::Hover(selector.to_string()));
        Ok(())
    }

    async fn focus(&self, selector: &str) -> Result<(), AdapterError> {
        self.require_match(selector)?;
        self.record(PerformedAction::Focus(selector.to_string()));
        Ok(())
    }

    async fn inner_text(&self, selector: &str) -> Result<Option<String>, AdapterError> {
        let model = self.inner.lock();
        Ok(Self::matching_indices(&model, selector)
            .first()
            .and_then(|&i| model.elements[i].summary.text.clone()))
    }

    async fn body_text(&self) -> Result<String, AdapterError> {
        Ok(self.inner.lock().body_text.clone())
    }

    async fn attribute(
        &self,
        selector: &str,
        name: &str,
    ) -> Result<Option<String>, AdapterError> {
        let model = self.inner.lock();
        Ok(Self::matching_indices(&model, selector)
            .first()
            .and_then(|&i| {
                let summary = &model.elements[i].summary;
                match name {
                    "aria-label" => summary.aria_label.clone(),
                    "name" => summary.name.clone(),
                    "placeholder" => summary.placeholder.clone(),
                    "aria-expanded" => summary
                        .test_ids
                        .get("aria-expanded")
                        .cloned(),
                    _ => None,
                }
            }))
    }

    async fn eval(&self, _script: &str) -> Result<Value, AdapterError> {
        Ok(Value::Null)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, AdapterError> {
        self.record(PerformedAction::Screenshot);
        Ok(vec![0x89, 0x50, 0x4e, 0x47])
    }

    async fn html(&self) -> Result<String, AdapterError> {
        Ok(self.inner.lock().html.clone())
    }

    async fn dom_skeleton(&self) -> Result<String, AdapterError> {
        Ok(self.inner.lock().skeleton.clone())
    }

    async fn bring_to_front(&self) -> Result<(), AdapterError> {
        self.record(PerformedAction::BringToFront);
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<(), AdapterError> {
        {
            let mut model = self.inner.lock();
            for element in &mut model.elements {
                if element.visible_after_scroll {
                    element.summary.visible = true;
                    element.state.visible = true;
                }
            }
        }
        self.record(PerformedAction::ScrollIntoView(selector.to_string()));
        Ok(())
    }

    async fn scroll_by(&self, dy: i64) -> Result<(), AdapterError> {
        {
            let mut model = self.inner.lock();
            for element in &mut model.elements {
                if element.visible_after_scroll {
                    element.summary.visible = true;
                    element.state.visible = true;
                }
            }
        }
        self.record(PerformedAction::ScrollBy(dy));
        Ok(())
    }

    async fn wait_for_load(&self, _timeout: Duration) -> Result<bool, AdapterError> {
        Ok(self.inner.lock().loaded)
    }

    async fn wait_network_idle(
        &self,
        _quiet: Duration,
        _timeout: Duration,
    ) -> Result<bool, AdapterError> {
        Ok(self.inner.lock().network_idle)
    }

    async fn mutation_rate(&self, _window: Duration) -> Result<f64, AdapterError> {
        Ok(self.inner.lock().mutation_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_box() -> ScriptedElement {
        ScriptedElement::new("input[name=\"search\"]", "input")
            .aria_label("Search Wikipedia")
            .name("search")
            .role("searchbox")
    }

    #[tokio::test]
    async fn attribute_selectors_match() {
        let page = ScriptedPage::new("https://en.wikipedia.org")
            .with_elements(vec![search_box()]);
        assert_eq!(
            page.query_count("[aria-label=\"Search Wikipedia\"]").await.unwrap(),
            1
        );
        assert_eq!(page.query_count("input[name=\"search\"]").await.unwrap(), 1);
        assert_eq!(page.query_count("[name=\"other\"]").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn role_nth_selects_visible_family_members() {
        let page = ScriptedPage::new("https://youtube.com").with_elements(vec![
            ScriptedElement::new("#v1", "a").role("link").id("v1"),
            ScriptedElement::new("#v2", "a").role("link").id("v2").hidden(),
            ScriptedElement::new("#v3", "a").role("link").id("v3"),
        ]);
        // Hidden #v2 is skipped: nth=1 lands on #v3.
        assert_eq!(page.query_count("role=link >> nth=1").await.unwrap(), 1);
        assert_eq!(page.query_count("role=link >> nth=2").await.unwrap(), 0);
        page.click("role=link >> nth=0").await.unwrap();
        assert_eq!(
            page.actions(),
            vec![PerformedAction::Click("role=link >> nth=0".to_string())]
        );
    }

    #[tokio::test]
    async fn escape_dismisses_overlays() {
        let page = ScriptedPage::new("https://example.org").with_elements(vec![
            ScriptedElement::new("#modal", "div").overlay(),
            search_box(),
        ]);
        page.press(None, "Escape").await.unwrap();
        assert_eq!(page.query_count("#modal").await.unwrap(), 0);
        assert_eq!(page.query_count("input[name=\"search\"]").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn bbox_frames_advance_per_sample() {
        let frames = vec![
            BoundingBox { x: 0.0, y: 0.0, width: 10.0, height: 10.0 },
            BoundingBox { x: 5.0, y: 0.0, width: 10.0, height: 10.0 },
            BoundingBox { x: 5.0, y: 0.0, width: 10.0, height: 10.0 },
        ];
        let page = ScriptedPage::new("https://example.org").with_elements(vec![
            ScriptedElement::new("#btn", "button").id("btn").bbox_frames(frames),
        ]);
        let a = page.bounding_box("#btn").await.unwrap().unwrap();
        let b = page.bounding_box("#btn").await.unwrap().unwrap();
        let c = page.bounding_box("#btn").await.unwrap().unwrap();
        let d = page.bounding_box("#btn").await.unwrap().unwrap();
        assert_eq!(a.x, 0.0);
        assert_eq!(b.x, 5.0);
        assert_eq!(c.x, 5.0);
        assert_eq!(d.x, 5.0);
    }
}
