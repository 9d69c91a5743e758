//! Browser adapter: the only crate that talks to a live browser
//!
//! Everything above this layer speaks [`PageDriver`], a seam exposing the
//! query / locator / wait / gate primitives the engine needs. The concrete
//! implementation drives Chromium over CDP; tests drive the
//! [`testkit::ScriptedPage`] double instead.

pub mod chromium;
pub mod config;
pub mod driver;
pub mod error;
pub mod js;
pub mod metrics;
pub mod pool;
pub mod stealth;
pub mod testkit;

pub use chromium::ChromiumDriver;
pub use config::BrowserLaunchConfig;
pub use driver::{BoundingBox, ElementState, ElementSummary, PageDriver};
pub use error::AdapterError;
pub use pool::{BrowserPool, PageGuard};

use std::env;
use std::path::PathBuf;

use which::which;

/// Locate a Chrome/Chromium executable, honoring `WEBPILOT_CHROME` first.
pub fn detect_chrome_executable() -> Option<PathBuf> {
    if let Ok(raw) = env::var("WEBPILOT_CHROME") {
        let path = PathBuf::from(raw);
        if path.exists() {
            return Some(path);
        }
    }
    for name in [
        "chromium",
        "chromium-browser",
        "google-chrome",
        "google-chrome-stable",
        "chrome",
    ] {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }
    None
}
