//! Anti-bot challenge detection
//!
//! Checked before readiness and before any discovery on every step. A hit
//! short-circuits the whole plan with a `blocked` verdict; the executor
//! captures forensics before bailing.

use browser_adapter::{AdapterError, PageDriver};
use tracing::warn;

const URL_PATTERNS: &[&str] = &[
    "/captcha",
    "/challenge",
    "chal_t=",
    "recaptcha",
    "hcaptcha",
];

const TEXT_PATTERNS: &[&str] = &[
    "verify you are human",
    "security check",
    "access denied",
];

const WIDGET_SELECTORS: &[&str] = &[
    "iframe[src*=\"recaptcha\"]",
    "iframe[src*=\"hcaptcha\"]",
    "#challenge-form",
    ".g-recaptcha",
    ".h-captcha",
];

/// What tripped the detector, for RCA evidence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockedSignal {
    UrlPattern(String),
    ChallengeWidget(String),
    PageText(String),
}

impl BlockedSignal {
    pub fn describe(&self) -> String {
        match self {
            BlockedSignal::UrlPattern(p) => format!("url matched challenge pattern `{p}`"),
            BlockedSignal::ChallengeWidget(s) => format!("challenge widget present: `{s}`"),
            BlockedSignal::PageText(t) => format!("page text contains `{t}`"),
        }
    }
}

/// Probe the current page for challenge signatures. Cheapest signals
/// first; returns the first match.
pub async fn detect_blocked(
    driver: &dyn PageDriver,
) -> Result<Option<BlockedSignal>, AdapterError> {
    let url = driver.current_url().await?.to_lowercase();
    for pattern in URL_PATTERNS {
        if url.contains(pattern) {
            warn!(%url, pattern, "challenge url detected");
            return Ok(Some(BlockedSignal::UrlPattern(pattern.to_string())));
        }
    }

    for selector in WIDGET_SELECTORS {
        if driver.query_count(selector).await? > 0 {
            warn!(selector, "challenge widget detected");
            return Ok(Some(BlockedSignal::ChallengeWidget(selector.to_string())));
        }
    }

    let body = driver.body_text().await?.to_lowercase();
    for pattern in TEXT_PATTERNS {
        if body.contains(pattern) {
            warn!(pattern, "challenge text detected");
            return Ok(Some(BlockedSignal::PageText(pattern.to_string())));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use browser_adapter::testkit::ScriptedPage;

    #[tokio::test]
    async fn challenge_url_is_blocked() {
        let page = ScriptedPage::new("https://example.org/gate?chal_t=abc123");
        let signal = detect_blocked(&page).await.unwrap().unwrap();
        assert_eq!(signal, BlockedSignal::UrlPattern("chal_t=".to_string()));
    }

    #[tokio::test]
    async fn challenge_text_is_blocked() {
        let page = ScriptedPage::new("https://example.org/")
            .with_body_text("Please verify you are human to continue.");
        let signal = detect_blocked(&page).await.unwrap().unwrap();
        assert!(matches!(signal, BlockedSignal::PageText(_)));
    }

    #[tokio::test]
    async fn clean_pages_pass() {
        let page = ScriptedPage::new("https://en.wikipedia.org")
            .with_body_text("Welcome to Wikipedia.");
        assert!(detect_blocked(&page).await.unwrap().is_none());
    }
}
