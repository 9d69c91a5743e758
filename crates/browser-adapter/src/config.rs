//! Launch configuration for the Chromium driver

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::detect_chrome_executable;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrowserLaunchConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,

    pub headless: bool,

    /// Anti-detection patches installed before every navigation.
    pub stealth: bool,

    /// Persistent user-data directory; `None` means a throwaway profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data_dir: Option<PathBuf>,

    pub viewport_width: u32,
    pub viewport_height: u32,

    pub nav_timeout_ms: u64,
}

impl Default for BrowserLaunchConfig {
    fn default() -> Self {
        Self {
            executable: detect_chrome_executable(),
            headless: true,
            stealth: false,
            user_data_dir: None,
            viewport_width: 1366,
            viewport_height: 900,
            nav_timeout_ms: 30_000,
        }
    }
}

impl BrowserLaunchConfig {
    pub fn with_stealth(mut self, stealth: bool) -> Self {
        self.stealth = stealth;
        self
    }

    pub fn with_profile_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.user_data_dir = dir;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }
}
