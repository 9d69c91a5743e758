//! Cache keying
//!
//! `(session_scope, url_path_pattern, element_name, action_class)`. The
//! session scope folds in a user-identity proxy and a session epoch so
//! authenticated dynamic apps never read another session's selectors.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;
use webpilot_core_types::ActionClass;

use crate::CacheError;

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub session_scope: String,
    pub url_pattern: String,
    pub element: String,
    pub action_class: ActionClass,
}

impl CacheKey {
    /// Build a key from a raw URL and an already-normalized element name.
    pub fn new(
        session_scope: impl Into<String>,
        url: &str,
        element: impl Into<String>,
        action_class: ActionClass,
    ) -> Result<Self, CacheError> {
        Ok(Self {
            session_scope: session_scope.into(),
            url_pattern: normalize_url(url)?,
            element: element.into(),
            action_class,
        })
    }

    /// Flat key for the hot tier: `{scope}:{url_path}:{element}:{action}`.
    pub fn hot_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.session_scope,
            self.url_pattern,
            self.element,
            self.action_class.name()
        )
    }
}

/// Origin + path, query and fragment stripped.
pub fn normalize_url(raw: &str) -> Result<String, CacheError> {
    let parsed = Url::parse(raw).map_err(|e| CacheError::Key(e.to_string()))?;
    let origin = parsed.origin().ascii_serialization();
    let path = parsed.path().trim_end_matches('/');
    Ok(format!("{origin}{path}"))
}

/// Session scope segment: domain + path + identity proxy + session epoch.
/// The identity proxy is digested so cookies or usernames never land in
/// store keys.
pub fn session_scope(url: &str, identity_proxy: Option<&str>, epoch: u64) -> String {
    let base = normalize_url(url).unwrap_or_else(|_| url.to_string());
    let identity = match identity_proxy {
        Some(identity) => {
            let digest = Sha256::digest(identity.as_bytes());
            hex::encode(&digest[..4])
        }
        None => "anon".to_string(),
    };
    format!("{base}|{identity}|e{epoch}")
}
