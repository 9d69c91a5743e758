//! Persistent memoization of successful discoveries
//!
//! Two tiers: a hot in-process map with a short TTL, and a warm sqlite
//! store that survives restarts. Only stable selectors are ever written.
//! A cached selector is re-validated against the page's current DOM
//! fingerprint; drift beyond the threshold evicts both tiers write-through.
//! Cache trouble never fails a run — a broken store reads as a miss.

pub mod cache;
pub mod entry;
pub mod fingerprint;
pub mod hot;
pub mod key;
pub mod warm;

pub use cache::{CacheDecision, CacheSource, SelectorCache};
pub use entry::CacheEntry;
pub use fingerprint::{drift_fraction, Fingerprint};
pub use hot::HotTier;
pub use key::CacheKey;
pub use warm::{SqliteWarmTier, WarmTier};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("warm tier error: {0}")]
    Warm(String),

    #[error("invalid cache key: {0}")]
    Key(String),
}

impl From<rusqlite::Error> for CacheError {
    fn from(err: rusqlite::Error) -> Self {
        CacheError::Warm(err.to_string())
    }
}
