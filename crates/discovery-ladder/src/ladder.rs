//! The ladder itself: survey, screen, walk the tiers
//!
//! Order of operations per discovery: app adapters (when one claims the
//! intent), the ordinal strategy (when the intent carries an ordinal),
//! then the eight tiers against a scoped-then-global survey. The first
//! tier whose screened candidate uniquely addresses an element wins;
//! later tiers' winners become the fallback chain.

use std::time::Duration;

use browser_adapter::{AdapterError, ElementSummary, PageDriver};
use tokio::time::timeout;
use tracing::{debug, warn};
use webpilot_core_types::{Candidate, Intent, StrategyKind};

use crate::adapter::AdapterRegistry;
use crate::matching;
use crate::tiers::{self, TierOptions};

const FALLBACK_CHAIN_LIMIT: usize = 3;

/// Per-call knobs. Heal reprobes raise `heal_round` to loosen matching
/// and may seed the last-known-good selector from the cache.
#[derive(Clone, Debug, Default)]
pub struct LadderOptions {
    pub heal_round: u32,
    /// Last-known-good candidate from the cache, tried first once the
    /// reprobe reaches the last-resort round.
    pub seed: Option<Candidate>,
    /// Strategies with good heal history for this element, evaluated
    /// before the default stability order.
    pub preferred: Vec<StrategyKind>,
    /// Whole-discovery budget; `None` means the default 60s wrapper.
    pub budget: Option<Duration>,
}

impl LadderOptions {
    pub fn for_round(heal_round: u32) -> Self {
        Self {
            heal_round,
            ..Self::default()
        }
    }

    fn tier_options(&self) -> TierOptions {
        TierOptions {
            fuzzy_role_name: self.heal_round >= 1,
            fuzzy_placeholder_label: self.heal_round >= 2,
            loose_last_resort: self.heal_round >= 3,
        }
    }

    fn budget(&self) -> Duration {
        self.budget.unwrap_or(Duration::from_secs(60))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DiscoveryOutcome {
    pub candidate: Candidate,
    /// Alternative selectors from lower tiers, best first.
    pub fallback_chain: Vec<String>,
}

pub struct DiscoveryLadder {
    adapters: AdapterRegistry,
}

impl DiscoveryLadder {
    pub fn new(adapters: AdapterRegistry) -> Self {
        Self { adapters }
    }

    /// Find the most stable locator for `intent`, or nothing if every
    /// strategy is exhausted. Exhaustion and out-of-range ordinals are
    /// `Ok(None)`, never errors.
    pub async fn discover(
        &self,
        driver: &dyn PageDriver,
        intent: &Intent,
        options: &LadderOptions,
    ) -> Result<Option<DiscoveryOutcome>, AdapterError> {
        telemetry::metrics::record_discovery();
        match timeout(options.budget(), self.discover_inner(driver, intent, options)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(element = %intent.element, "discovery exceeded its budget");
                Ok(None)
            }
        }
    }

    async fn discover_inner(
        &self,
        driver: &dyn PageDriver,
        intent: &Intent,
        options: &LadderOptions,
    ) -> Result<Option<DiscoveryOutcome>, AdapterError> {
        // Cache seed first on last-resort rounds: cheapest possible probe.
        if options.tier_options().loose_last_resort {
            if let Some(seed) = &options.seed {
                if driver.query_count(&seed.selector).await? == 1 {
                    debug!(selector = %seed.selector, "cache seed still resolves");
                    return Ok(Some(DiscoveryOutcome {
                        candidate: seed.clone(),
                        fallback_chain: Vec::new(),
                    }));
                }
            }
        }

        // App adapters outrank the generic ladder for widgets they claim.
        let url = driver.current_url().await.unwrap_or_default();
        if let Some(adapter) = self.adapters.find(intent, &url) {
            let candidates = adapter.resolve(driver, intent).await?;
            if let Some(candidate) = candidates.into_iter().next() {
                telemetry::discovery(0, candidate.strategy.name(), &candidate.selector, candidate.stable);
                return Ok(Some(DiscoveryOutcome {
                    candidate,
                    fallback_chain: Vec::new(),
                }));
            }
        }

        let summaries = self.scoped_survey(driver, intent).await?;
        let eligible = screen(&summaries, intent);

        // Ordinal intents resolve positionally or not at all.
        if let Some(ordinal) = intent.ordinal {
            return self.discover_ordinal(driver, intent, &eligible, ordinal).await;
        }

        let tier_options = options.tier_options();
        let mut winners: Vec<Candidate> = Vec::new();

        // Stability order by default; strategies with strong heal history
        // for this element are pulled to the front.
        let mut tier_results: Vec<(u8, StrategyKind, Vec<Candidate>)> = vec![
            (1u8, StrategyKind::AriaLabel, tiers::aria_label(&eligible, intent)),
            (2, StrategyKind::AriaPlaceholder, tiers::aria_placeholder(&eligible, intent)),
            (3, StrategyKind::NameAttr, tiers::name_attr(&eligible, intent)),
            (4, StrategyKind::Placeholder, tiers::placeholder(&eligible, intent, tier_options)),
            (5, StrategyKind::LabelFor, tiers::label_for(&eligible, intent, tier_options)),
            (6, StrategyKind::RoleName, tiers::role_name(&eligible, intent, tier_options)),
            (7, StrategyKind::DataTestId, tiers::data_testid(&eligible, intent, tier_options)),
            (8, StrategyKind::IdClass, tiers::id_class(&eligible, intent, tier_options)),
        ];
        if !options.preferred.is_empty() {
            let rank = |strategy: &StrategyKind| {
                options
                    .preferred
                    .iter()
                    .position(|p| p == strategy)
                    .unwrap_or(options.preferred.len())
            };
            tier_results.sort_by_key(|(_, strategy, _)| rank(strategy));
        }

        for (tier, _, candidates) in tier_results {
            match self.unique_winner(driver, candidates).await? {
                Some(candidate) => {
                    if winners.is_empty() {
                        telemetry::discovery(
                            tier,
                            candidate.strategy.name(),
                            &candidate.selector,
                            candidate.stable,
                        );
                    }
                    winners.push(candidate);
                    if winners.len() > FALLBACK_CHAIN_LIMIT {
                        break;
                    }
                }
                None => debug!(tier, element = %intent.element, "tier produced no unique candidate"),
            }
        }

        let mut winners = winners.into_iter();
        Ok(winners.next().map(|candidate| DiscoveryOutcome {
            candidate,
            fallback_chain: winners.map(|c| c.selector).collect(),
        }))
    }

    /// Scope-first survey: constrain to the named container, fall back to
    /// the whole page when the container yields nothing.
    async fn scoped_survey(
        &self,
        driver: &dyn PageDriver,
        intent: &Intent,
    ) -> Result<Vec<ElementSummary>, AdapterError> {
        let scope = intent.within.as_deref().or(intent.region.as_deref());
        if let Some(scope) = scope {
            let scoped = driver.survey(Some(scope)).await?;
            if !scoped.is_empty() {
                debug!(scope, count = scoped.len(), "scoped survey");
                return Ok(scoped);
            }
            debug!(scope, "scope empty or absent, falling back to global");
        }
        driver.survey(None).await
    }

    /// Nth element of the intent's role family. Scope has already been
    /// applied by the survey, so ordinal indexes inside the container when
    /// one was named. Out-of-range returns nothing.
    async fn discover_ordinal(
        &self,
        _driver: &dyn PageDriver,
        intent: &Intent,
        eligible: &[ElementSummary],
        ordinal: usize,
    ) -> Result<Option<DiscoveryOutcome>, AdapterError> {
        let role = intent.role_family();
        let family: Vec<&ElementSummary> = eligible
            .iter()
            .filter(|s| s.visible && s.role.as_deref() == Some(role))
            .collect();
        if ordinal >= family.len() {
            debug!(role, ordinal, family = family.len(), "ordinal out of range");
            return Ok(None);
        }

        // Global ordinals use the positional locator; scoped ordinals pin
        // the concrete element since the locator dialect has no scope form.
        let selector = if intent.within.is_some() || intent.region.is_some() {
            family[ordinal].selector.clone()
        } else {
            format!("role={role} >> nth={ordinal}")
        };
        let candidate = Candidate::new(selector, StrategyKind::Ordinal)
            .with_meta(serde_json::json!({ "role": role, "ordinal": ordinal }));
        telemetry::discovery(0, candidate.strategy.name(), &candidate.selector, candidate.stable);
        Ok(Some(DiscoveryOutcome {
            candidate,
            fallback_chain: Vec::new(),
        }))
    }

    /// Layer 5 of the screen: a tier wins only when its candidates reduce
    /// to one selector that addresses exactly one element.
    async fn unique_winner(
        &self,
        driver: &dyn PageDriver,
        candidates: Vec<Candidate>,
    ) -> Result<Option<Candidate>, AdapterError> {
        let mut distinct: Vec<Candidate> = Vec::new();
        for candidate in candidates {
            if !distinct.iter().any(|c| c.selector == candidate.selector) {
                distinct.push(candidate);
            }
        }
        match distinct.len() {
            0 => Ok(None),
            1 => {
                let candidate = distinct.remove(0);
                if driver.query_count(&candidate.selector).await? == 1 {
                    return Ok(Some(candidate));
                }
                // Attribute form ambiguous on the page (common when the
                // survey was scoped): pin the surveyed element via its
                // canonical path, trading stability for uniqueness.
                if let Some(canonical) = candidate.meta.get("canonical").and_then(|v| v.as_str()) {
                    if driver.query_count(canonical).await? == 1 {
                        let mut pinned = candidate.clone();
                        pinned.selector = canonical.to_string();
                        pinned.stable = false;
                        return Ok(Some(pinned));
                    }
                }
                Ok(None)
            }
            _ => {
                debug!(count = distinct.len(), "ambiguous tier, continuing ladder");
                Ok(None)
            }
        }
    }
}

/// Layers 1 and 2 of the false-positive screen, applied to the survey
/// before any tier runs.
fn screen(summaries: &[ElementSummary], intent: &Intent) -> Vec<ElementSummary> {
    let class = intent.action.action_class();
    summaries
        .iter()
        .filter(|s| matching::action_compatible(s, class))
        .filter(|s| {
            let label = s
                .aria_label
                .as_deref()
                .or(s.accessible_name.as_deref())
                .or(s.label_text.as_deref())
                .unwrap_or_default();
            !matching::control_token_clash(label, intent)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use browser_adapter::testkit::{ScriptedElement, ScriptedPage};
    use webpilot_core_types::ActionKind;

    fn ladder() -> DiscoveryLadder {
        DiscoveryLadder::new(AdapterRegistry::new())
    }

    fn search_page() -> ScriptedPage {
        ScriptedPage::new("https://en.wikipedia.org").with_elements(vec![
            ScriptedElement::new("input[name=\"search\"]", "input")
                .aria_label("Search Wikipedia")
                .name("search")
                .role("searchbox"),
            ScriptedElement::new("#searchButton", "button")
                .id("searchButton")
                .role("button")
                .accessible_name("Search"),
        ])
    }

    #[tokio::test]
    async fn tier_one_wins_on_aria_label() {
        let page = search_page();
        let intent = Intent::new("Search Wikipedia", ActionKind::Fill).with_value("AI");
        let outcome = ladder()
            .discover(&page, &intent, &LadderOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.candidate.selector, "[aria-label=\"Search Wikipedia\"]");
        assert_eq!(outcome.candidate.strategy, StrategyKind::AriaLabel);
        assert!(outcome.candidate.stable);
    }

    #[tokio::test]
    async fn name_tier_wins_when_aria_is_absent() {
        let page = ScriptedPage::new("https://app.example.org").with_elements(vec![
            ScriptedElement::new("input[name=\"Amount\"]", "input").name("Amount"),
        ]);
        let intent = Intent::new("Amount", ActionKind::Fill).with_value("100000");
        let outcome = ladder()
            .discover(&page, &intent, &LadderOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.candidate.selector, "[name=\"Amount\"]");
        assert_eq!(outcome.candidate.score, 0.98);
    }

    #[tokio::test]
    async fn fill_intents_skip_buttons_with_matching_labels() {
        let page = ScriptedPage::new("https://example.org").with_elements(vec![
            ScriptedElement::new("#submit", "input")
                .id("submit")
                .input_type("submit")
                .aria_label("Amount"),
        ]);
        let intent = Intent::new("Amount", ActionKind::Fill).with_value("5");
        let outcome = ladder()
            .discover(&page, &intent, &LadderOptions::default())
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn ambiguous_tier_falls_through_to_the_next() {
        // Two different aria-labels both anchored-match "Name" via
        // suffixes, so tier 1 is ambiguous; label-for resolves it.
        let page = ScriptedPage::new("https://example.org").with_elements(vec![
            ScriptedElement::new("#a", "input").id("a").aria_label("Name *"),
            ScriptedElement::new("#b", "input").id("b").aria_label("Name (required)"),
            ScriptedElement::new("#the-name", "input")
                .id("the-name")
                .label_text("Name"),
        ]);
        let intent = Intent::new("Name", ActionKind::Fill).with_value("x");
        let outcome = ladder()
            .discover(&page, &intent, &LadderOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.candidate.strategy, StrategyKind::LabelFor);
        assert_eq!(outcome.candidate.selector, "#the-name");
    }

    #[tokio::test]
    async fn ordinal_synthesizes_role_nth() {
        let page = ScriptedPage::new("https://youtube.com").with_elements(vec![
            ScriptedElement::new("#v1", "a").id("v1").role("link").accessible_name("Video one"),
            ScriptedElement::new("#v2", "a").id("v2").role("link").accessible_name("Video two"),
        ]);
        let intent = Intent::new("First Video", ActionKind::Click).with_ordinal(0);
        let outcome = ladder()
            .discover(&page, &intent, &LadderOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.candidate.selector, "role=link >> nth=0");
        assert_eq!(outcome.candidate.score, 0.95);
        assert_eq!(outcome.candidate.strategy, StrategyKind::Ordinal);
    }

    #[tokio::test]
    async fn ordinal_out_of_range_returns_nothing() {
        let page = ScriptedPage::new("https://youtube.com").with_elements(vec![
            ScriptedElement::new("#v1", "a").id("v1").role("link"),
        ]);
        let intent = Intent::new("Fifth Video", ActionKind::Click).with_ordinal(4);
        let outcome = ladder()
            .discover(&page, &intent, &LadderOptions::default())
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn scoped_discovery_prefers_the_container() {
        let page = ScriptedPage::new("https://app.example.org").with_elements(vec![
            ScriptedElement::new("#global-name", "input")
                .id("global-name")
                .aria_label("Name"),
            ScriptedElement::new("#dialog-name", "input")
                .id("dialog-name")
                .aria_label("Name")
                .region_name("New Account"),
        ]);
        let intent = Intent::new("Name", ActionKind::Fill)
            .with_value("Acme")
            .with_within("New Account");
        let outcome = ladder()
            .discover(&page, &intent, &LadderOptions::default())
            .await
            .unwrap()
            .unwrap();
        // Only the dialog's field was surveyed, so its aria-label selector
        // is unique within the survey and on the page.
        assert_eq!(outcome.candidate.strategy, StrategyKind::AriaLabel);
    }

    #[tokio::test]
    async fn relaxed_rounds_admit_fuzzy_role_names() {
        let page = ScriptedPage::new("https://example.org").with_elements(vec![
            ScriptedElement::new("#save-btn", "button")
                .id("save-btn")
                .role("button")
                .accessible_name("Save Opportunity"),
        ]);
        let intent = Intent::new("Save", ActionKind::Click);

        let strict = ladder()
            .discover(&page, &intent, &LadderOptions::default())
            .await
            .unwrap();
        // Tier 8 still finds #save-btn by id tokens even in strict mode.
        assert!(strict.is_some());

        let relaxed = ladder()
            .discover(&page, &intent, &LadderOptions::for_round(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(relaxed.candidate.strategy, StrategyKind::RoleName);
    }

    #[tokio::test]
    async fn seed_short_circuits_last_resort_rounds() {
        let page = ScriptedPage::new("https://example.org").with_elements(vec![
            ScriptedElement::new("#amount", "input").id("amount"),
        ]);
        let intent = Intent::new("Missing Label", ActionKind::Fill).with_value("1");
        let seed = Candidate::new("#amount", StrategyKind::LabelFor);
        let options = LadderOptions {
            heal_round: 3,
            seed: Some(seed.clone()),
            ..LadderOptions::default()
        };
        let outcome = ladder().discover(&page, &intent, &options).await.unwrap().unwrap();
        assert_eq!(outcome.candidate.selector, "#amount");
    }
}
