//! STATIC vs DYNAMIC classification
//!
//! Sampled once per run on first navigation; the result tunes wait and
//! retry budgets everywhere downstream.

use std::time::Duration;

use browser_adapter::{AdapterError, PageDriver};
use tracing::debug;
use webpilot_core_types::{ProfileSetting, RuntimeProfile};

/// Mutations per second at or above which a page counts as DYNAMIC.
pub const MUTATION_RATE_THRESHOLD: f64 = 10.0;

/// Pure classification; deterministic for a given sampled rate.
pub fn classify_mutation_rate(rate: f64) -> RuntimeProfile {
    if rate >= MUTATION_RATE_THRESHOLD {
        RuntimeProfile::Dynamic
    } else {
        RuntimeProfile::Static
    }
}

pub struct ProfileDetector {
    setting: ProfileSetting,
    sample_window: Duration,
}

impl ProfileDetector {
    pub fn new(setting: ProfileSetting) -> Self {
        Self {
            setting,
            sample_window: Duration::from_millis(1000),
        }
    }

    pub fn with_sample_window(mut self, window: Duration) -> Self {
        self.sample_window = window;
        self
    }

    /// Detect the profile for the current page, honoring a fixed override.
    pub async fn detect(
        &self,
        driver: &dyn PageDriver,
        url: &str,
    ) -> Result<RuntimeProfile, AdapterError> {
        let profile = match self.setting.fixed() {
            Some(fixed) => fixed,
            None => {
                let rate = driver.mutation_rate(self.sample_window).await?;
                debug!(rate, "sampled dom mutation rate");
                classify_mutation_rate(rate)
            }
        };
        telemetry::profile_detected(profile.name(), url);
        Ok(profile)
    }
}
