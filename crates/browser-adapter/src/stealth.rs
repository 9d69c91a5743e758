//! Anti-detection patches
//!
//! Robustness measure for sites that degrade under obvious automation, not
//! an attack tool: webdriver flag removal, plausible plugin/language
//! surfaces, and a small viewport jitter so repeated runs don't share an
//! exact fingerprint.

use chromiumoxide::page::Page;
use rand::Rng;
use tracing::debug;

use crate::error::AdapterError;

const STEALTH_PATCH: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
    Object.defineProperty(navigator, 'plugins', {
        get: () => [{ name: 'Chrome PDF Viewer' }, { name: 'Native Client' }],
    });
    window.chrome = window.chrome || { runtime: {} };
    const origQuery = window.navigator.permissions && window.navigator.permissions.query;
    if (origQuery) {
        window.navigator.permissions.query = (parameters) =>
            parameters.name === 'notifications'
                ? Promise.resolve({ state: Notification.permission })
                : origQuery(parameters);
    }
"#;

/// Install the patches so they run before any page script on every
/// navigation in this page's lifetime.
pub async fn apply(page: &Page) -> Result<(), AdapterError> {
    page.evaluate_on_new_document(STEALTH_PATCH)
        .await
        .map_err(|e| AdapterError::Io(e.to_string()))?;
    debug!("stealth patches installed");
    Ok(())
}

/// Jittered viewport so parallel runs don't present identical dimensions.
pub fn jittered_viewport(base_width: u32, base_height: u32) -> (u32, u32) {
    let mut rng = rand::thread_rng();
    (
        base_width + rng.gen_range(0..16),
        base_height + rng.gen_range(0..16),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_within_bounds() {
        for _ in 0..32 {
            let (w, h) = jittered_viewport(1366, 900);
            assert!((1366..1382).contains(&w));
            assert!((900..916).contains(&h));
        }
    }
}
