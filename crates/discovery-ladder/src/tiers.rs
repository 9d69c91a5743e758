//! The eight ladder tiers as pure functions over surveyed elements
//!
//! Each tier inspects element summaries and synthesizes candidates with
//! tier-anchored confidence. Tiers know nothing about the browser; the
//! ladder feeds them survey results and screens their output.

use browser_adapter::ElementSummary;
use webpilot_core_types::{ActionKind, Candidate, Intent, StrategyKind};

use crate::matching;

/// Matching mode, loosened round by round during heal reprobes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TierOptions {
    /// Tier 6 accepts containment instead of anchored names.
    pub fuzzy_role_name: bool,
    /// Tiers 4 and 5 accept containment.
    pub fuzzy_placeholder_label: bool,
    /// Tiers 7 and 8 accept partial slugs.
    pub loose_last_resort: bool,
}

fn quoted_attr(attr: &str, value: &str) -> String {
    format!("[{attr}=\"{value}\"]")
}

/// Attribute-form candidate that remembers the element's canonical
/// selector, so the ladder can disambiguate when the attribute form is
/// not unique on the page.
fn attr_candidate(
    summary: &ElementSummary,
    attr: &str,
    value: &str,
    strategy: StrategyKind,
) -> Candidate {
    Candidate::new(quoted_attr(attr, value), strategy)
        .with_meta(serde_json::json!({ "canonical": summary.selector }))
}

/// Tier 1: aria-label, anchored with the suffix whitelist.
pub fn aria_label(summaries: &[ElementSummary], intent: &Intent) -> Vec<Candidate> {
    summaries
        .iter()
        .filter_map(|s| {
            let label = s.aria_label.as_deref()?;
            matching::anchored_match(label, &intent.element)
                .then(|| attr_candidate(s, "aria-label", label, StrategyKind::AriaLabel))
        })
        .collect()
}

/// Tier 2: aria-placeholder attribute.
pub fn aria_placeholder(summaries: &[ElementSummary], intent: &Intent) -> Vec<Candidate> {
    summaries
        .iter()
        .filter_map(|s| {
            let value = s.aria_placeholder.as_deref()?;
            matching::anchored_match(value, &intent.element)
                .then(|| attr_candidate(s, "aria-placeholder", value, StrategyKind::AriaPlaceholder))
        })
        .collect()
}

/// Tier 3: `name` attribute, exact after alphanumeric folding so
/// "Close Date" finds `name="CloseDate"`.
pub fn name_attr(summaries: &[ElementSummary], intent: &Intent) -> Vec<Candidate> {
    let target: String = intent
        .element
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    summaries
        .iter()
        .filter_map(|s| {
            let name = s.name.as_deref()?;
            let folded: String = name
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            (!target.is_empty() && folded == target)
                .then(|| attr_candidate(s, "name", name, StrategyKind::NameAttr))
        })
        .collect()
}

/// Tier 4: placeholder, regex-anchored; containment when relaxed.
pub fn placeholder(
    summaries: &[ElementSummary],
    intent: &Intent,
    options: TierOptions,
) -> Vec<Candidate> {
    let re = matching::anchored_regex(&intent.element);
    summaries
        .iter()
        .filter_map(|s| {
            let value = s.placeholder.as_deref()?;
            let hit = match &re {
                Some(re) if !options.fuzzy_placeholder_label => re.is_match(value),
                _ => matching::fuzzy_match(value, &intent.element),
            };
            hit.then(|| attr_candidate(s, "placeholder", value, StrategyKind::Placeholder))
        })
        .collect()
}

/// Tier 5: `<label for=id>` association; targets the labeled control.
pub fn label_for(
    summaries: &[ElementSummary],
    intent: &Intent,
    options: TierOptions,
) -> Vec<Candidate> {
    summaries
        .iter()
        .filter_map(|s| {
            let label = s.label_text.as_deref()?;
            let id = s.id.as_deref()?;
            let hit = if options.fuzzy_placeholder_label {
                matching::fuzzy_match(label, &intent.element)
            } else {
                matching::anchored_match(label, &intent.element)
            };
            hit.then(|| Candidate::new(format!("#{id}"), StrategyKind::LabelFor))
        })
        .collect()
}

/// Role candidates for tier 6, from the action first and keyword hints
/// second. Click defaults to button.
pub fn infer_roles(intent: &Intent) -> Vec<&'static str> {
    let mut roles: Vec<&'static str> = Vec::new();
    let element = intent.element.to_lowercase();
    for (keyword, role) in [
        ("login", "button"),
        ("log in", "button"),
        ("submit", "button"),
        ("save", "button"),
        ("search", "searchbox"),
        ("continue", "button"),
        ("next", "button"),
        ("cancel", "button"),
        ("link", "link"),
        ("video", "link"),
        ("tab", "tab"),
        ("menu", "menuitem"),
        ("checkbox", "checkbox"),
    ] {
        if element.contains(keyword) && !roles.contains(&role) {
            roles.push(role);
        }
    }
    let action_role = match intent.action {
        ActionKind::Click | ActionKind::Press => "button",
        ActionKind::Fill | ActionKind::Type => "textbox",
        ActionKind::Select => "combobox",
        ActionKind::Check | ActionKind::Uncheck => "checkbox",
        _ => "button",
    };
    if !roles.contains(&action_role) {
        roles.push(action_role);
    }
    roles
}

/// Tier 6: ARIA role + accessible name. Name-dependent, so not stable.
pub fn role_name(
    summaries: &[ElementSummary],
    intent: &Intent,
    options: TierOptions,
) -> Vec<Candidate> {
    let roles = infer_roles(intent);
    summaries
        .iter()
        .filter_map(|s| {
            let role = s.role.as_deref()?;
            if !roles.contains(&role) {
                return None;
            }
            let name = s.accessible_name.as_deref()?;
            let hit = if options.fuzzy_role_name {
                matching::fuzzy_match(name, &intent.element)
            } else {
                matching::anchored_match(name, &intent.element)
            };
            hit.then(|| {
                Candidate::new(s.selector.clone(), StrategyKind::RoleName).with_meta(
                    serde_json::json!({ "role": role, "accessible_name": name }),
                )
            })
        })
        .collect()
}

/// Tier 7: data-* test attributes.
pub fn data_testid(
    summaries: &[ElementSummary],
    intent: &Intent,
    options: TierOptions,
) -> Vec<Candidate> {
    let slug = matching::slug(&intent.element);
    summaries
        .iter()
        .flat_map(|s| {
            let slug = slug.clone();
            s.test_ids.iter().filter_map(move |(attr, value)| {
                let normalized = value.to_lowercase().replace('_', "-");
                let hit = if options.loose_last_resort {
                    matching::tokens_contained(value, &slug.replace('-', " "))
                } else {
                    normalized == slug || normalized.contains(&slug)
                };
                hit.then(|| attr_candidate(s, attr, value, StrategyKind::DataTestId))
            })
        })
        .collect()
}

/// Tier 8: raw id or class. Last resort, volatile, never cached.
pub fn id_class(
    summaries: &[ElementSummary],
    intent: &Intent,
    options: TierOptions,
) -> Vec<Candidate> {
    let target_words = matching::slug(&intent.element).replace('-', " ");
    summaries
        .iter()
        .filter_map(|s| {
            let id_hit = s
                .id
                .as_deref()
                .map(|id| matching::tokens_contained(id, &target_words))
                .unwrap_or(false);
            let class_hit = options.loose_last_resort
                && s.classes
                    .iter()
                    .any(|class| matching::tokens_contained(class, &target_words));
            if id_hit {
                let id = s.id.as_deref().unwrap_or_default();
                Some(Candidate::new(format!("#{id}"), StrategyKind::IdClass))
            } else if class_hit {
                Some(Candidate::new(s.selector.clone(), StrategyKind::IdClass))
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(selector: &str) -> ElementSummary {
        ElementSummary {
            selector: selector.to_string(),
            tag: "input".to_string(),
            visible: true,
            enabled: true,
            ..ElementSummary::default()
        }
    }

    #[test]
    fn aria_label_tier_anchors() {
        let mut search = input("input.search");
        search.aria_label = Some("Search Wikipedia".to_string());
        let mut decoy = input("input.decoy");
        decoy.aria_label = Some("Search Wikipedia Articles".to_string());

        let intent = Intent::new("Search Wikipedia", ActionKind::Fill).with_value("ai");
        let candidates = aria_label(&[search, decoy], &intent);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].selector, "[aria-label=\"Search Wikipedia\"]");
        assert_eq!(candidates[0].score, 0.95);
        assert!(candidates[0].stable);
    }

    #[test]
    fn name_attr_folds_spaces_and_case() {
        let mut amount = input("input.amt");
        amount.name = Some("CloseDate".to_string());
        let intent = Intent::new("Close Date", ActionKind::Fill).with_value("12/31/2025");
        let candidates = name_attr(&[amount], &intent);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].selector, "[name=\"CloseDate\"]");
        assert_eq!(candidates[0].score, 0.98);
    }

    #[test]
    fn role_name_uses_action_default_and_fuzzy_relaxation() {
        let mut save = ElementSummary {
            selector: "#save-btn".to_string(),
            tag: "button".to_string(),
            role: Some("button".to_string()),
            visible: true,
            enabled: true,
            ..ElementSummary::default()
        };
        save.accessible_name = Some("Save Opportunity".to_string());

        let intent = Intent::new("Save", ActionKind::Click);
        let strict = role_name(std::slice::from_ref(&save), &intent, TierOptions::default());
        assert!(strict.is_empty());

        let relaxed = role_name(
            std::slice::from_ref(&save),
            &intent,
            TierOptions {
                fuzzy_role_name: true,
                ..TierOptions::default()
            },
        );
        assert_eq!(relaxed.len(), 1);
        assert!(!relaxed[0].stable);
    }

    #[test]
    fn label_for_targets_the_control_id() {
        let mut field = input("html > body > input:nth-of-type(1)");
        field.id = Some("fname".to_string());
        field.label_text = Some("First Name *".to_string());
        let intent = Intent::new("First Name", ActionKind::Fill).with_value("Ada");
        let candidates = label_for(&[field], &intent, TierOptions::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].selector, "#fname");
    }

    #[test]
    fn testid_matches_slugs() {
        let mut field = input("input.x");
        field
            .test_ids
            .insert("data-testid".to_string(), "close-date".to_string());
        let intent = Intent::new("Close Date", ActionKind::Fill).with_value("x");
        let candidates = data_testid(&[field], &intent, TierOptions::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].selector, "[data-testid=\"close-date\"]");
        assert_eq!(candidates[0].score, 0.85);
    }

    #[test]
    fn ordinal_role_inference_prefers_keywords() {
        let login = Intent::new("Login Button", ActionKind::Click);
        assert_eq!(infer_roles(&login)[0], "button");

        let video = Intent::new("First Video", ActionKind::Click);
        assert_eq!(infer_roles(&video)[0], "link");

        let plain_fill = Intent::new("Amount", ActionKind::Fill).with_value("1");
        assert!(infer_roles(&plain_fill).contains(&"textbox"));
    }
}
