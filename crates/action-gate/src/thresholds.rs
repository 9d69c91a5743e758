//! Retry-adaptive gate thresholds
//!
//! Each heal round buys the target more slack: a longer evaluation budget,
//! a looser bbox tolerance, and one extra stability sample.

use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GateThresholds {
    pub timeout: Duration,
    /// Max pixel delta between consecutive bbox samples.
    pub tolerance_px: f64,
    pub samples: u32,
    /// Pause between bbox samples.
    pub sample_delay: Duration,
}

impl GateThresholds {
    pub const BASE_TIMEOUT_MS: u64 = 5_000;
    pub const BASE_TOLERANCE_PX: f64 = 2.0;
    pub const BASE_SAMPLES: u32 = 3;

    pub fn for_round(heal_round: u32) -> Self {
        Self {
            timeout: Duration::from_millis(Self::BASE_TIMEOUT_MS + 1_000 * heal_round as u64),
            tolerance_px: Self::BASE_TOLERANCE_PX + 0.5 * heal_round as f64,
            samples: Self::BASE_SAMPLES + heal_round,
            sample_delay: Duration::from_millis(120),
        }
    }

    pub fn with_sample_delay(mut self, delay: Duration) -> Self {
        self.sample_delay = delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_relax_with_heal_rounds() {
        let base = GateThresholds::for_round(0);
        assert_eq!(base.timeout, Duration::from_millis(5_000));
        assert_eq!(base.tolerance_px, 2.0);
        assert_eq!(base.samples, 3);

        let round2 = GateThresholds::for_round(2);
        assert_eq!(round2.timeout, Duration::from_millis(7_000));
        assert_eq!(round2.tolerance_px, 3.0);
        assert_eq!(round2.samples, 5);
    }
}
