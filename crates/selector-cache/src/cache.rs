//! The composed dual-tier cache

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use tracing::warn;
use webpilot_core_types::Candidate;

use crate::entry::CacheEntry;
use crate::fingerprint::{drift_fraction, Fingerprint};
use crate::hot::HotTier;
use crate::key::CacheKey;
use crate::warm::WarmTier;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CacheSource {
    Hot,
    Warm,
}

impl CacheSource {
    pub fn name(&self) -> &'static str {
        match self {
            CacheSource::Hot => "hot",
            CacheSource::Warm => "warm",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CacheDecision {
    Hit { entry: CacheEntry, source: CacheSource },
    Miss,
}

impl CacheDecision {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheDecision::Hit { .. })
    }
}

/// Dual-tier selector cache. The warm tier is source of truth; the hot
/// tier is a low-latency projection refilled on warm hits.
pub struct SelectorCache {
    enabled: bool,
    hot: HotTier,
    warm: Option<Box<dyn WarmTier>>,
    drift_threshold: f64,
    retention_days: u64,
    fail_streaks: DashMap<String, u32>,
}

impl SelectorCache {
    pub fn new(
        enabled: bool,
        hot_ttl: Duration,
        warm: Option<Box<dyn WarmTier>>,
        drift_threshold: f64,
        retention_days: u64,
    ) -> Self {
        if let Some(warm) = &warm {
            if let Err(err) = warm.purge_expired(retention_days) {
                warn!(error = %err, "warm cache purge failed at startup");
            }
        }
        Self {
            enabled,
            hot: HotTier::new(hot_ttl),
            warm,
            drift_threshold,
            retention_days,
            fail_streaks: DashMap::new(),
        }
    }

    /// Disabled cache that always misses and never writes.
    pub fn disabled() -> Self {
        Self::new(false, Duration::from_secs(0), None, 0.35, 7)
    }

    /// Probe both tiers. Never fails: store errors degrade to a miss.
    pub fn lookup(&self, key: &CacheKey, current_fingerprint: &Fingerprint) -> CacheDecision {
        if !self.enabled {
            telemetry::cache_event("SKIPPED", "hot", &key.element, "memory disabled");
            return CacheDecision::Miss;
        }

        let hot_key = key.hot_key();
        if let Some(entry) = self.hot.get(&hot_key) {
            if self.drift_ok(key, &entry, current_fingerprint) {
                telemetry::cache_event("HIT", "hot", &key.element, &entry.selector);
                telemetry::metrics::record_cache_hit();
                self.bump(key);
                return CacheDecision::Hit {
                    entry,
                    source: CacheSource::Hot,
                };
            }
            self.invalidate(key);
            telemetry::cache_event("MISS", "hot", &key.element, "drift invalidated");
            telemetry::metrics::record_cache_miss();
            return CacheDecision::Miss;
        }

        if let Some(warm) = &self.warm {
            match warm.get(key) {
                Ok(Some(entry)) => {
                    let cutoff = Utc::now() - ChronoDuration::days(self.retention_days as i64);
                    if entry.last_seen_at < cutoff {
                        self.invalidate(key);
                        telemetry::cache_event("MISS", "warm", &key.element, "expired");
                        telemetry::metrics::record_cache_miss();
                        return CacheDecision::Miss;
                    }
                    if self.drift_ok(key, &entry, current_fingerprint) {
                        // Warm hit refills the hot projection.
                        self.hot.put(hot_key, entry.clone());
                        telemetry::cache_event("HIT", "warm", &key.element, &entry.selector);
                        telemetry::metrics::record_cache_hit();
                        self.bump(key);
                        return CacheDecision::Hit {
                            entry,
                            source: CacheSource::Warm,
                        };
                    }
                    self.invalidate(key);
                    telemetry::cache_event("MISS", "warm", &key.element, "drift invalidated");
                    telemetry::metrics::record_cache_miss();
                    return CacheDecision::Miss;
                }
                Ok(None) => {}
                Err(err) => {
                    // Reads never fail the request.
                    warn!(error = %err, "warm cache read failed, proceeding without");
                }
            }
        }

        telemetry::cache_event("MISS", "warm", &key.element, "absent");
        telemetry::metrics::record_cache_miss();
        CacheDecision::Miss
    }

    /// Persist a discovery. Only stable candidates are written; volatile
    /// strategies are skipped loudly so the invariant is observable.
    pub fn save(&self, key: &CacheKey, candidate: &Candidate, fingerprint: Fingerprint) {
        if !self.enabled {
            return;
        }
        if !candidate.stable {
            telemetry::cache_event("SKIPPED", "hot", &key.element, &candidate.selector);
            return;
        }
        let entry = CacheEntry::from_candidate(candidate, fingerprint);
        if let Some(warm) = &self.warm {
            if let Err(err) = warm.upsert(key, &entry) {
                warn!(error = %err, "warm cache write failed");
            }
        }
        self.hot.put(key.hot_key(), entry);
        telemetry::cache_event("SAVED", "warm", &key.element, &candidate.selector);
    }

    /// Write-through invalidation: both tiers evicted before rediscovery.
    pub fn invalidate(&self, key: &CacheKey) {
        if let Some(warm) = &self.warm {
            if let Err(err) = warm.evict(key) {
                warn!(error = %err, "warm cache evict failed");
            }
        }
        self.hot.evict(&key.hot_key());
        self.fail_streaks.remove(&key.hot_key());
    }

    /// A cached selector failed gate validation. Two consecutive failures
    /// evict the entry; returns true when that happened.
    pub fn record_validation_failure(&self, key: &CacheKey) -> bool {
        let hot_key = key.hot_key();
        let mut streak = self.fail_streaks.entry(hot_key).or_insert(0);
        *streak += 1;
        if *streak >= 2 {
            drop(streak);
            self.invalidate(key);
            return true;
        }
        false
    }

    pub fn record_validation_success(&self, key: &CacheKey) {
        self.fail_streaks.remove(&key.hot_key());
    }

    fn bump(&self, key: &CacheKey) {
        if let Some(warm) = &self.warm {
            if let Err(err) = warm.bump_hit(key) {
                warn!(error = %err, "hit count bump failed");
            }
        }
    }

    /// Drift at exactly the threshold still reuses; invalidation requires
    /// strictly more.
    fn drift_ok(&self, key: &CacheKey, entry: &CacheEntry, current: &Fingerprint) -> bool {
        let drift = drift_fraction(&entry.dom_fingerprint, current);
        let decision = if drift > self.drift_threshold {
            "invalidate"
        } else {
            "reuse"
        };
        telemetry::cache_drift(
            &key.hot_key(),
            drift * 100.0,
            self.drift_threshold * 100.0,
            decision,
        );
        drift <= self.drift_threshold
    }
}
