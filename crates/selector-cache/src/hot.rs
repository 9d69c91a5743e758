//! Hot tier: in-process KV with TTL

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::entry::CacheEntry;

pub struct HotTier {
    inner: DashMap<String, (CacheEntry, Instant)>,
    ttl: Duration,
}

impl HotTier {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let expired = match self.inner.get(key) {
            Some(slot) => {
                let (entry, stored_at) = slot.value();
                if stored_at.elapsed() <= self.ttl {
                    return Some(entry.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            self.inner.remove(key);
        }
        None
    }

    /// `setex` semantics: value plus a fresh TTL window.
    pub fn put(&self, key: String, entry: CacheEntry) {
        self.inner.insert(key, (entry, Instant::now()));
    }

    pub fn evict(&self, key: &str) {
        self.inner.remove(key);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::Fingerprint;
    use webpilot_core_types::{Candidate, StrategyKind};

    fn entry() -> CacheEntry {
        CacheEntry::from_candidate(
            &Candidate::new("[name=\"q\"]", StrategyKind::NameAttr),
            Fingerprint::of_skeleton("html|body"),
        )
    }

    #[test]
    fn expired_entries_read_as_misses() {
        let tier = HotTier::new(Duration::from_millis(0));
        tier.put("k".to_string(), entry());
        std::thread::sleep(Duration::from_millis(5));
        assert!(tier.get("k").is_none());
        assert!(tier.is_empty());
    }

    #[test]
    fn fresh_entries_hit_and_repeat() {
        let tier = HotTier::new(Duration::from_secs(60));
        tier.put("k".to_string(), entry());
        let first = tier.get("k");
        let second = tier.get("k");
        assert_eq!(first, second);
        assert!(first.is_some());
    }
}
