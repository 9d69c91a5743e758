//! Cache-fronted discovery
//!
//! The orchestrator talks to this service, not to the ladder directly:
//! probe the cache first, validate the cached selector still resolves,
//! fall back to the full ladder, and persist stable winners.

use std::sync::Arc;

use browser_adapter::{AdapterError, PageDriver};
use selector_cache::{CacheDecision, CacheKey, Fingerprint, SelectorCache};
use tracing::debug;
use webpilot_core_types::{Candidate, Intent, StrategyKind};

use crate::ladder::{DiscoveryLadder, DiscoveryOutcome, LadderOptions};

pub struct DiscoveryService {
    ladder: DiscoveryLadder,
    cache: Arc<SelectorCache>,
}

impl DiscoveryService {
    pub fn new(ladder: DiscoveryLadder, cache: Arc<SelectorCache>) -> Self {
        Self { ladder, cache }
    }

    pub fn cache(&self) -> &Arc<SelectorCache> {
        &self.cache
    }

    /// Cache key for an intent on the current page; `None` when the URL
    /// does not parse (cache is skipped, discovery still runs).
    pub fn key_for(
        &self,
        intent: &Intent,
        session_scope: &str,
        url: &str,
    ) -> Option<CacheKey> {
        CacheKey::new(
            session_scope,
            url,
            intent.normalized_element(),
            intent.action.action_class(),
        )
        .ok()
    }

    /// Resolve a selector for `intent`, cache first. `preferred` carries
    /// heal-history strategy priors for reprobes; empty means stability
    /// order.
    pub async fn discover(
        &self,
        driver: &dyn PageDriver,
        intent: &Intent,
        session_scope: &str,
        heal_round: u32,
        preferred: &[StrategyKind],
    ) -> Result<Option<DiscoveryOutcome>, AdapterError> {
        let url = driver.current_url().await?;
        let skeleton = driver.dom_skeleton().await?;
        let fingerprint = Fingerprint::of_skeleton(&skeleton);
        let key = self.key_for(intent, session_scope, &url);

        // Fresh steps consult the cache; heal reprobes go straight to the
        // ladder (the cached selector already failed).
        let mut seed: Option<Candidate> = None;
        if let Some(key) = &key {
            match self.cache.lookup(key, &fingerprint) {
                CacheDecision::Hit { entry, .. } if heal_round == 0 => {
                    if driver.query_count(&entry.selector).await? == 1 {
                        return Ok(Some(DiscoveryOutcome {
                            candidate: entry.to_candidate(),
                            fallback_chain: Vec::new(),
                        }));
                    }
                    debug!(selector = %entry.selector, "cached selector no longer resolves");
                    self.cache.record_validation_failure(key);
                }
                CacheDecision::Hit { entry, .. } => {
                    // Last-known-good biases the last-resort reprobe round.
                    seed = Some(entry.to_candidate());
                }
                CacheDecision::Miss => {}
            }
        }

        let options = LadderOptions {
            heal_round,
            seed,
            preferred: preferred.to_vec(),
            budget: None,
        };
        let outcome = self.ladder.discover(driver, intent, &options).await?;

        if let (Some(outcome), Some(key)) = (&outcome, &key) {
            self.cache.save(key, &outcome.candidate, fingerprint);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterRegistry;
    use browser_adapter::testkit::{ScriptedElement, ScriptedPage};
    use selector_cache::{SelectorCache, SqliteWarmTier};
    use std::time::Duration;
    use webpilot_core_types::{ActionKind, StrategyKind};

    fn service() -> DiscoveryService {
        let cache = SelectorCache::new(
            true,
            Duration::from_secs(3600),
            Some(Box::new(SqliteWarmTier::open_in_memory().unwrap())),
            0.35,
            7,
        );
        DiscoveryService::new(
            DiscoveryLadder::new(AdapterRegistry::new()),
            Arc::new(cache),
        )
    }

    fn amount_page() -> ScriptedPage {
        ScriptedPage::new("https://app.example.org/opp")
            .with_skeleton("html|body|form|input!Amount|button")
            .with_elements(vec![
                ScriptedElement::new("input[name=\"Amount\"]", "input").name("Amount"),
            ])
    }

    #[tokio::test]
    async fn second_discovery_hits_the_cache() {
        let service = service();
        let page = amount_page();
        let intent = Intent::new("Amount", ActionKind::Fill).with_value("100000");

        let first = service
            .discover(&page, &intent, "scope", 0, &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.candidate.strategy, StrategyKind::NameAttr);

        // Cached now; same key, same fingerprint, selector still resolves.
        let second = service
            .discover(&page, &intent, "scope", 0, &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.candidate.selector, "[name=\"Amount\"]");
    }

    #[tokio::test]
    async fn dead_cached_selector_falls_back_to_the_ladder() {
        let service = service();
        let page = amount_page();
        let intent = Intent::new("Amount", ActionKind::Fill).with_value("100000");

        // Seed the cache with a selector that no longer exists.
        let key = service
            .key_for(&intent, "scope", "https://app.example.org/opp")
            .unwrap();
        let stale = Candidate::new("#input-339", StrategyKind::LabelFor);
        service.cache().save(
            &key,
            &stale,
            Fingerprint::of_skeleton("html|body|form|input!Amount|button"),
        );

        let outcome = service
            .discover(&page, &intent, "scope", 0, &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.candidate.selector, "[name=\"Amount\"]");
        assert_eq!(outcome.candidate.strategy, StrategyKind::NameAttr);
    }

    #[tokio::test]
    async fn cross_session_scopes_do_not_share_entries() {
        let service = service();
        let page = amount_page();
        let intent = Intent::new("Amount", ActionKind::Fill).with_value("100000");

        service.discover(&page, &intent, "scope-a", 0, &[]).await.unwrap();

        let key_b = service
            .key_for(&intent, "scope-b", "https://app.example.org/opp")
            .unwrap();
        let skeleton = Fingerprint::of_skeleton("html|body|form|input!Amount|button");
        assert!(!service.cache().lookup(&key_b, &skeleton).is_hit());
    }
}
