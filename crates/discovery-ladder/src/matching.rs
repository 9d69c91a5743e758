//! Match predicates and the false-positive screens
//!
//! Fuzzy matches must be anchored: "Name" may match "Name *" or
//! "Name (required)" but never "Name of Parent Account". Data-field
//! intents additionally reject UI-control labels (resize handles, column
//! sizers) that happen to share words with the target.

use browser_adapter::ElementSummary;
use regex::Regex;
use webpilot_core_types::{ActionClass, Intent};

/// Suffix decorations a form label may carry after the bare field name.
const ALLOWED_SUFFIXES: &[&str] = &["*", "(required)", "(optional)", ":", "?"];

/// Input types that can never take `fill`.
const NON_FILLABLE_TYPES: &[&str] = &[
    "range", "color", "file", "button", "submit", "image", "reset", "hidden",
];

/// Label tokens that mark UI chrome rather than data fields.
const CONTROL_TOKENS: &[&str] = &["resize", "width", "column", "slider", "spinner"];

fn normalize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Exact match, or target + one whitelisted suffix. Anchored: the
/// candidate must start at the target's first word.
pub fn anchored_match(candidate: &str, target: &str) -> bool {
    let candidate = normalize(candidate);
    let target = normalize(target);
    if candidate == target {
        return true;
    }
    let Some(rest) = candidate.strip_prefix(&target) else {
        return false;
    };
    let rest = rest.trim();
    rest.is_empty() || ALLOWED_SUFFIXES.contains(&rest)
}

/// Relaxed variant used by heal reprobes: target contained anywhere.
pub fn fuzzy_match(candidate: &str, target: &str) -> bool {
    normalize(candidate).contains(&normalize(target))
}

/// Regex form of the anchored match, for attribute tiers that advertise
/// regex semantics.
pub fn anchored_regex(target: &str) -> Option<Regex> {
    let escaped = regex::escape(&normalize(target));
    let suffixes = ALLOWED_SUFFIXES
        .iter()
        .map(|s| regex::escape(s))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)^\s*{escaped}\s*(?:{suffixes})?\s*$")).ok()
}

/// Layer 1: per-action fillability / clickability.
pub fn action_compatible(summary: &ElementSummary, class: ActionClass) -> bool {
    match class {
        ActionClass::Fill => {
            if let Some(input_type) = &summary.input_type {
                if NON_FILLABLE_TYPES.contains(&input_type.to_lowercase().as_str()) {
                    return false;
                }
            }
            matches!(summary.tag.as_str(), "input" | "textarea" | "select")
                || summary.role.as_deref() == Some("combobox")
                || summary.role.as_deref() == Some("textbox")
                || summary.role.as_deref() == Some("searchbox")
        }
        ActionClass::Click => summary.visible,
        ActionClass::Navigate | ActionClass::Assert => true,
    }
}

/// Layer 2: reject UI-control labels for data-field intents unless the
/// intent itself asks for one.
pub fn control_token_clash(label: &str, intent: &Intent) -> bool {
    if intent.action.action_class() != ActionClass::Fill {
        return false;
    }
    let label = normalize(label);
    let target = normalize(&intent.element);
    CONTROL_TOKENS
        .iter()
        .any(|token| label.contains(token) && !target.contains(token))
}

/// Slug used for test-id and id/class token matching: "Close Date" ->
/// "close-date".
pub fn slug(target: &str) -> String {
    normalize(target).replace(' ', "-")
}

/// Loose token containment for last-resort tiers: every target word
/// appears in the value.
pub fn tokens_contained(value: &str, target: &str) -> bool {
    let value = value.to_lowercase();
    normalize(target)
        .split(' ')
        .all(|word| !word.is_empty() && value.contains(word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpilot_core_types::ActionKind;

    #[test]
    fn anchoring_accepts_whitelisted_suffixes_only() {
        assert!(anchored_match("Name", "Name"));
        assert!(anchored_match("Name *", "Name"));
        assert!(anchored_match("Name (required)", "Name"));
        assert!(anchored_match("Name:", "Name"));
        assert!(!anchored_match("Name of Parent Account", "Name"));
        assert!(!anchored_match("Last Name", "Name"));
    }

    #[test]
    fn regex_form_agrees_with_anchoring() {
        let re = anchored_regex("Search Wikipedia").unwrap();
        assert!(re.is_match("Search Wikipedia"));
        assert!(re.is_match("search wikipedia *"));
        assert!(!re.is_match("Search Wikipedia Articles"));
    }

    #[test]
    fn fillability_rejects_widget_inputs() {
        let mut summary = ElementSummary {
            tag: "input".to_string(),
            visible: true,
            enabled: true,
            ..ElementSummary::default()
        };
        assert!(action_compatible(&summary, ActionClass::Fill));

        summary.input_type = Some("range".to_string());
        assert!(!action_compatible(&summary, ActionClass::Fill));

        summary.input_type = Some("submit".to_string());
        assert!(!action_compatible(&summary, ActionClass::Fill));
    }

    #[test]
    fn control_tokens_clash_only_for_data_fields() {
        let fill = Intent::new("Amount", ActionKind::Fill).with_value("100");
        assert!(control_token_clash("Amount column width", &fill));
        assert!(!control_token_clash("Amount", &fill));

        let click = Intent::new("Amount", ActionKind::Click);
        assert!(!control_token_clash("Amount column width", &click));
    }

    #[test]
    fn slugs_and_token_containment() {
        assert_eq!(slug("Close Date"), "close-date");
        assert!(tokens_contained("opp-close-date-field", "Close Date"));
        assert!(!tokens_contained("open-date-field", "Close Date"));
    }
}
