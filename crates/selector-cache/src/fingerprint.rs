//! DOM structural fingerprints and drift measurement
//!
//! The skeleton string from the adapter is folded into a 64-bucket token
//! histogram. Drift between two fingerprints is the normalized L1 distance
//! of their histograms, which moves smoothly as page structure changes and
//! stays 0 for identical skeletons.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const BUCKETS: usize = 64;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a skeleton string (`tag#id@role|tag|...`).
    pub fn of_skeleton(skeleton: &str) -> Self {
        let mut histogram = [0u8; BUCKETS];
        for token in skeleton.split('|').filter(|t| !t.is_empty()) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = digest[0] as usize % BUCKETS;
            histogram[bucket] = histogram[bucket].saturating_add(1);
        }
        Self(hex::encode(histogram))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_hex(value: &str) -> Option<Self> {
        (hex::decode(value).map(|b| b.len() == BUCKETS).unwrap_or(false))
            .then(|| Self(value.to_string()))
    }

    fn histogram(&self) -> [u64; BUCKETS] {
        let mut histogram = [0u64; BUCKETS];
        if let Ok(bytes) = hex::decode(&self.0) {
            for (i, b) in bytes.iter().take(BUCKETS).enumerate() {
                histogram[i] = *b as u64;
            }
        }
        histogram
    }
}

/// Drift between two fingerprints as a fraction in [0, 1].
pub fn drift_fraction(stored: &Fingerprint, current: &Fingerprint) -> f64 {
    let a = stored.histogram();
    let b = current.histogram();
    let total_a: u64 = a.iter().sum();
    let total_b: u64 = b.iter().sum();
    let denominator = total_a.max(total_b);
    if denominator == 0 {
        return 0.0;
    }
    let distance: u64 = a.iter().zip(b.iter()).map(|(x, y)| x.abs_diff(*y)).sum();
    (distance as f64 / denominator as f64).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_skeletons_have_zero_drift() {
        let a = Fingerprint::of_skeleton("html|body|form!login|input!user|input!pass");
        let b = Fingerprint::of_skeleton("html|body|form!login|input!user|input!pass");
        assert_eq!(a, b);
        assert_eq!(drift_fraction(&a, &b), 0.0);
    }

    #[test]
    fn small_changes_drift_less_than_rewrites() {
        let base = Fingerprint::of_skeleton("html|body|form|input!a|input!b|input!c|button");
        let tweaked = Fingerprint::of_skeleton("html|body|form|input!a|input!b|input!d|button");
        let rewritten = Fingerprint::of_skeleton("html|body|nav|ul|li|li|li|div@grid|span");

        let small = drift_fraction(&base, &tweaked);
        let large = drift_fraction(&base, &rewritten);
        assert!(small < large);
        assert!(small > 0.0);
        assert!(large <= 1.0);
    }

    #[test]
    fn round_trips_through_hex() {
        let fp = Fingerprint::of_skeleton("html|body|main");
        let back = Fingerprint::from_hex(fp.as_str()).unwrap();
        assert_eq!(fp, back);
        assert!(Fingerprint::from_hex("zz").is_none());
    }
}
