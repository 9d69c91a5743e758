//! Engine-wide counters, snapshot-style

use std::sync::atomic::{AtomicU64, Ordering};

static RUNS_PASS: AtomicU64 = AtomicU64::new(0);
static RUNS_FAIL: AtomicU64 = AtomicU64::new(0);
static RUNS_BLOCKED: AtomicU64 = AtomicU64::new(0);
static RUNS_PARTIAL: AtomicU64 = AtomicU64::new(0);
static CACHE_HITS: AtomicU64 = AtomicU64::new(0);
static CACHE_MISSES: AtomicU64 = AtomicU64::new(0);
static HEAL_ROUNDS: AtomicU64 = AtomicU64::new(0);
static DISCOVERIES: AtomicU64 = AtomicU64::new(0);

pub fn record_verdict(verdict: &str) {
    match verdict {
        "PASS" => RUNS_PASS.fetch_add(1, Ordering::Relaxed),
        "FAIL" => RUNS_FAIL.fetch_add(1, Ordering::Relaxed),
        "BLOCKED" => RUNS_BLOCKED.fetch_add(1, Ordering::Relaxed),
        _ => RUNS_PARTIAL.fetch_add(1, Ordering::Relaxed),
    };
}

pub fn record_cache_hit() {
    CACHE_HITS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_cache_miss() {
    CACHE_MISSES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_heal_round() {
    HEAL_ROUNDS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_discovery() {
    DISCOVERIES.fetch_add(1, Ordering::Relaxed);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineMetricsSnapshot {
    pub runs_pass: u64,
    pub runs_fail: u64,
    pub runs_blocked: u64,
    pub runs_partial: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub heal_rounds: u64,
    pub discoveries: u64,
}

pub fn snapshot() -> EngineMetricsSnapshot {
    EngineMetricsSnapshot {
        runs_pass: RUNS_PASS.load(Ordering::Relaxed),
        runs_fail: RUNS_FAIL.load(Ordering::Relaxed),
        runs_blocked: RUNS_BLOCKED.load(Ordering::Relaxed),
        runs_partial: RUNS_PARTIAL.load(Ordering::Relaxed),
        cache_hits: CACHE_HITS.load(Ordering::Relaxed),
        cache_misses: CACHE_MISSES.load(Ordering::Relaxed),
        heal_rounds: HEAL_ROUNDS.load(Ordering::Relaxed),
        discoveries: DISCOVERIES.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    for counter in [
        &RUNS_PASS,
        &RUNS_FAIL,
        &RUNS_BLOCKED,
        &RUNS_PARTIAL,
        &CACHE_HITS,
        &CACHE_MISSES,
        &HEAL_ROUNDS,
        &DISCOVERIES,
    ] {
        counter.store(0, Ordering::Relaxed);
    }
}
