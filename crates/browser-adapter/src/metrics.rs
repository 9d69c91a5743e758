//! Driver activity counters
//!
//! Every read and interaction the driver performs rides an injected probe
//! over the CDP bridge; these counters track how many went out, how many
//! came back, and how long the bridge kept us waiting. Snapshot access,
//! like the engine-wide counters in `telemetry`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static PROBES_SENT: AtomicU64 = AtomicU64::new(0);
static PROBES_OK: AtomicU64 = AtomicU64::new(0);
static PROBES_FAILED: AtomicU64 = AtomicU64::new(0);
static BRIDGE_WAIT_US: AtomicU64 = AtomicU64::new(0);

pub fn probe_sent() {
    PROBES_SENT.fetch_add(1, Ordering::Relaxed);
}

/// A probe round-tripped; `elapsed` is added to the cumulative bridge wait.
pub fn probe_ok(elapsed: Duration) {
    PROBES_OK.fetch_add(1, Ordering::Relaxed);
    let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
    BRIDGE_WAIT_US.fetch_add(micros, Ordering::Relaxed);
}

pub fn probe_failed() {
    PROBES_FAILED.fetch_add(1, Ordering::Relaxed);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DriverActivitySnapshot {
    pub probes_sent: u64,
    pub probes_ok: u64,
    pub probes_failed: u64,
    pub bridge_wait_us: u64,
}

impl DriverActivitySnapshot {
    /// Mean bridge latency per successful probe, in microseconds.
    pub fn mean_wait_us(&self) -> u64 {
        if self.probes_ok == 0 {
            0
        } else {
            self.bridge_wait_us / self.probes_ok
        }
    }
}

pub fn snapshot() -> DriverActivitySnapshot {
    DriverActivitySnapshot {
        probes_sent: PROBES_SENT.load(Ordering::Relaxed),
        probes_ok: PROBES_OK.load(Ordering::Relaxed),
        probes_failed: PROBES_FAILED.load(Ordering::Relaxed),
        bridge_wait_us: BRIDGE_WAIT_US.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    for counter in [&PROBES_SENT, &PROBES_OK, &PROBES_FAILED, &BRIDGE_WAIT_US] {
        counter.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_probe_outcomes_and_bridge_wait() {
        reset();
        probe_sent();
        probe_ok(Duration::from_micros(200));
        probe_sent();
        probe_ok(Duration::from_micros(400));
        probe_sent();
        probe_failed();

        let snap = snapshot();
        assert_eq!(snap.probes_sent, 3);
        assert_eq!(snap.probes_ok, 2);
        assert_eq!(snap.probes_failed, 1);
        assert_eq!(snap.bridge_wait_us, 600);
        assert_eq!(snap.mean_wait_us(), 300);
    }
}
