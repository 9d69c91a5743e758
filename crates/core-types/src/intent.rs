//! Intent: the atomic unit of user desire
//!
//! An intent names an element in human terms ("Search Wikipedia", "Save"),
//! an action to perform on it, and optional scoping hints. Intents are
//! immutable after plan compilation; discovery enriches them into
//! [`crate::PlanStep`]s without touching the original.

use serde::{Deserialize, Serialize};

/// The action a step performs against its target element.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    Fill,
    Type,
    Press,
    Select,
    Check,
    Uncheck,
    Hover,
    Focus,
    Go,
    AssertText,
    AssertVisible,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Fill => "fill",
            ActionKind::Type => "type",
            ActionKind::Press => "press",
            ActionKind::Select => "select",
            ActionKind::Check => "check",
            ActionKind::Uncheck => "uncheck",
            ActionKind::Hover => "hover",
            ActionKind::Focus => "focus",
            ActionKind::Go => "go",
            ActionKind::AssertText => "assert_text",
            ActionKind::AssertVisible => "assert_visible",
        }
    }

    /// Whether a `value` is mandatory for this action.
    pub fn requires_value(&self) -> bool {
        matches!(
            self,
            ActionKind::Fill
                | ActionKind::Type
                | ActionKind::Select
                | ActionKind::Press
                | ActionKind::AssertText
        )
    }

    /// Coarse class used for cache keying: fill-like actions must land on
    /// fillable controls, click-like on clickable ones.
    pub fn action_class(&self) -> ActionClass {
        match self {
            ActionKind::Fill | ActionKind::Type | ActionKind::Select => ActionClass::Fill,
            ActionKind::Click
            | ActionKind::Check
            | ActionKind::Uncheck
            | ActionKind::Hover
            | ActionKind::Focus
            | ActionKind::Press => ActionClass::Click,
            ActionKind::Go => ActionClass::Navigate,
            ActionKind::AssertText | ActionKind::AssertVisible => ActionClass::Assert,
        }
    }

    pub fn is_assertion(&self) -> bool {
        matches!(self, ActionKind::AssertText | ActionKind::AssertVisible)
    }
}

/// Cache-keying class of an action.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionClass {
    Fill,
    Click,
    Navigate,
    Assert,
}

impl ActionClass {
    pub fn name(&self) -> &'static str {
        match self {
            ActionClass::Fill => "fill",
            ActionClass::Click => "click",
            ActionClass::Navigate => "navigate",
            ActionClass::Assert => "assert",
        }
    }
}

/// Semantic class of the target element, when the caller knows it.
///
/// Drives role-family inference for ordinal selection ("first video").
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Video,
    Result,
    Link,
    Button,
    Item,
    Card,
    Field,
}

impl ElementKind {
    /// ARIA role family the ordinal strategy iterates over.
    pub fn role_family(&self) -> &'static str {
        match self {
            ElementKind::Video | ElementKind::Result | ElementKind::Link => "link",
            ElementKind::Button => "button",
            ElementKind::Item | ElementKind::Card => "listitem",
            ElementKind::Field => "textbox",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "video" => Some(ElementKind::Video),
            "result" => Some(ElementKind::Result),
            "link" => Some(ElementKind::Link),
            "button" => Some(ElementKind::Button),
            "item" => Some(ElementKind::Item),
            "card" => Some(ElementKind::Card),
            "field" | "input" => Some(ElementKind::Field),
            _ => None,
        }
    }
}

/// One user-level directive: element description + action (+ value/scope).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Human name of the target element ("Search Wikipedia", "Save").
    pub element: String,

    /// Optional named region the element lives in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    pub action: ActionKind,

    /// Required for fill/type/select/press/assert_text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Scope hint: container (dialog/form/section) to search first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub within: Option<String>,

    /// 0-indexed position within the inferred role family.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordinal: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<ElementKind>,

    /// Optional outcome hint from the planner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
}

impl Intent {
    pub fn new(element: impl Into<String>, action: ActionKind) -> Self {
        Self {
            element: element.into(),
            region: None,
            action,
            value: None,
            within: None,
            ordinal: None,
            element_type: None,
            expected: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_within(mut self, within: impl Into<String>) -> Self {
        self.within = Some(within.into());
        self
    }

    pub fn with_ordinal(mut self, ordinal: usize) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    pub fn with_element_type(mut self, kind: ElementKind) -> Self {
        self.element_type = Some(kind);
        self
    }

    /// Element name normalized for cache keying: case-folded,
    /// whitespace-collapsed.
    pub fn normalized_element(&self) -> String {
        self.element
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// Role family for ordinal selection, from the explicit element type
    /// first, then keywords in the element name, defaulting to `link`.
    pub fn role_family(&self) -> &'static str {
        if let Some(kind) = self.element_type {
            return kind.role_family();
        }
        for word in self.element.split_whitespace() {
            if let Some(kind) = ElementKind::from_keyword(word) {
                return kind.role_family();
            }
        }
        "link"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_requirements_follow_action() {
        assert!(ActionKind::Fill.requires_value());
        assert!(ActionKind::Press.requires_value());
        assert!(!ActionKind::Click.requires_value());
        assert!(!ActionKind::AssertVisible.requires_value());
    }

    #[test]
    fn action_class_partitions_actions() {
        assert_eq!(ActionKind::Fill.action_class(), ActionClass::Fill);
        assert_eq!(ActionKind::Check.action_class(), ActionClass::Click);
        assert_eq!(ActionKind::Go.action_class(), ActionClass::Navigate);
        assert_eq!(ActionKind::AssertText.action_class(), ActionClass::Assert);
    }

    #[test]
    fn normalized_element_folds_case_and_whitespace() {
        let intent = Intent::new("  Search   Wikipedia ", ActionKind::Fill);
        assert_eq!(intent.normalized_element(), "search wikipedia");
    }

    #[test]
    fn role_family_prefers_explicit_type() {
        let intent = Intent::new("first video", ActionKind::Click)
            .with_element_type(ElementKind::Button);
        assert_eq!(intent.role_family(), "button");

        let inferred = Intent::new("First Video", ActionKind::Click);
        assert_eq!(inferred.role_family(), "link");

        let fallback = Intent::new("thingamajig", ActionKind::Click);
        assert_eq!(fallback.role_family(), "link");
    }
}
