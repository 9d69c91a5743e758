//! Discovery strategy identifiers and tier-anchored confidence
//!
//! The ladder, the selector cache, and the heal history all refer to
//! strategies by the same tag so that "what found this selector" survives
//! serialization across store boundaries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which rung of the discovery ladder produced a selector.
///
/// Ordered stability-first; `tier()` gives the ladder position used in
/// telemetry, `anchor_score()` the tier-anchored confidence.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    AriaLabel,
    AriaPlaceholder,
    NameAttr,
    Placeholder,
    LabelFor,
    RoleName,
    DataTestId,
    IdClass,
    /// Runs before tier 1 when the intent carries an ordinal.
    Ordinal,
    /// A registered app-specific adapter; carries the adapter's name.
    AppAdapter(String),
}

impl StrategyKind {
    pub fn name(&self) -> &str {
        match self {
            StrategyKind::AriaLabel => "aria_label",
            StrategyKind::AriaPlaceholder => "aria_placeholder",
            StrategyKind::NameAttr => "name_attr",
            StrategyKind::Placeholder => "placeholder",
            StrategyKind::LabelFor => "label_for",
            StrategyKind::RoleName => "role_name",
            StrategyKind::DataTestId => "data_testid",
            StrategyKind::IdClass => "id_class",
            StrategyKind::Ordinal => "ordinal",
            StrategyKind::AppAdapter(name) => name,
        }
    }

    /// Ladder tier number for telemetry; 0 for strategies composed in
    /// outside the eight fixed tiers.
    pub fn tier(&self) -> u8 {
        match self {
            StrategyKind::AriaLabel => 1,
            StrategyKind::AriaPlaceholder => 2,
            StrategyKind::NameAttr => 3,
            StrategyKind::Placeholder => 4,
            StrategyKind::LabelFor => 5,
            StrategyKind::RoleName => 6,
            StrategyKind::DataTestId => 7,
            StrategyKind::IdClass => 8,
            StrategyKind::Ordinal | StrategyKind::AppAdapter(_) => 0,
        }
    }

    /// Tier-anchored confidence. Drives tiebreakers and healing priors,
    /// never gate pass/fail.
    pub fn anchor_score(&self) -> f64 {
        match self {
            StrategyKind::AriaLabel => 0.95,
            StrategyKind::AriaPlaceholder => 0.92,
            StrategyKind::NameAttr => 0.98,
            StrategyKind::Placeholder => 0.88,
            StrategyKind::LabelFor => 0.92,
            StrategyKind::RoleName => 0.95,
            StrategyKind::DataTestId => 0.85,
            StrategyKind::IdClass => 0.70,
            StrategyKind::Ordinal => 0.95,
            StrategyKind::AppAdapter(_) => 0.90,
        }
    }

    /// Whether selectors from this strategy survive renders and deploys.
    /// Only stable strategies are ever written to the selector cache.
    pub fn is_stable(&self) -> bool {
        match self {
            StrategyKind::AriaLabel
            | StrategyKind::AriaPlaceholder
            | StrategyKind::NameAttr
            | StrategyKind::Placeholder
            | StrategyKind::LabelFor
            | StrategyKind::DataTestId => true,
            StrategyKind::RoleName | StrategyKind::IdClass => false,
            StrategyKind::Ordinal => false,
            StrategyKind::AppAdapter(_) => false,
        }
    }

    /// Parse the serialized tag back into a strategy. Unknown tags are
    /// treated as app-adapter names.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "aria_label" => StrategyKind::AriaLabel,
            "aria_placeholder" => StrategyKind::AriaPlaceholder,
            "name_attr" => StrategyKind::NameAttr,
            "placeholder" => StrategyKind::Placeholder,
            "label_for" => StrategyKind::LabelFor,
            "role_name" => StrategyKind::RoleName,
            "data_testid" => StrategyKind::DataTestId,
            "id_class" => StrategyKind::IdClass,
            "ordinal" => StrategyKind::Ordinal,
            other => StrategyKind::AppAdapter(other.to_string()),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What one ladder tier returns for an intent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub selector: String,

    /// Confidence in [0, 1], anchored at the tier score.
    pub score: f64,

    pub strategy: StrategyKind,

    pub stable: bool,

    /// Strategy-specific detail (matched attribute, container, ...).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub meta: serde_json::Value,
}

impl Candidate {
    pub fn new(selector: impl Into<String>, strategy: StrategyKind) -> Self {
        let stable = strategy.is_stable();
        let score = strategy.anchor_score();
        Self {
            selector: selector.into(),
            score,
            strategy,
            stable,
            meta: serde_json::Value::Null,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score.clamp(0.0, 1.0);
        self
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_order_is_stability_first() {
        assert_eq!(StrategyKind::AriaLabel.tier(), 1);
        assert_eq!(StrategyKind::IdClass.tier(), 8);
        assert_eq!(StrategyKind::Ordinal.tier(), 0);
    }

    #[test]
    fn volatile_strategies_are_not_stable() {
        assert!(!StrategyKind::RoleName.is_stable());
        assert!(!StrategyKind::IdClass.is_stable());
        assert!(StrategyKind::NameAttr.is_stable());
    }

    #[test]
    fn parse_round_trips_builtin_tags() {
        for kind in [
            StrategyKind::AriaLabel,
            StrategyKind::NameAttr,
            StrategyKind::IdClass,
            StrategyKind::Ordinal,
        ] {
            assert_eq!(StrategyKind::parse(kind.name()), kind);
        }
        assert_eq!(
            StrategyKind::parse("sf_combobox"),
            StrategyKind::AppAdapter("sf_combobox".to_string())
        );
    }

    #[test]
    fn candidate_inherits_tier_anchors() {
        let candidate = Candidate::new("[name=\"Amount\"]", StrategyKind::NameAttr);
        assert_eq!(candidate.score, 0.98);
        assert!(candidate.stable);
    }
}
