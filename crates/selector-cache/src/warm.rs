//! Warm tier: durable sqlite store
//!
//! WAL mode, cached prepared statements, upsert under the unique
//! `(session_scope, url_pattern, element)` constraint. Hit-count bumps are
//! read-modify-write; last writer wins, counts are advisory.

use std::path::Path;

use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use tracing::debug;
use webpilot_core_types::StrategyKind;

use crate::entry::CacheEntry;
use crate::fingerprint::Fingerprint;
use crate::key::CacheKey;
use crate::CacheError;

/// Warm-tier contract, kept narrow so tests can run against an in-memory
/// database and broken stores degrade to misses.
pub trait WarmTier: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;
    fn upsert(&self, key: &CacheKey, entry: &CacheEntry) -> Result<(), CacheError>;
    fn bump_hit(&self, key: &CacheKey) -> Result<(), CacheError>;
    fn evict(&self, key: &CacheKey) -> Result<(), CacheError>;
    /// Remove entries unseen for longer than `retention_days`.
    fn purge_expired(&self, retention_days: u64) -> Result<usize, CacheError>;
}

pub struct SqliteWarmTier {
    conn: Mutex<Connection>,
}

impl SqliteWarmTier {
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Warm(e.to_string()))?;
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, CacheError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS selector_cache (
                session_scope   TEXT NOT NULL,
                url_pattern     TEXT NOT NULL,
                element         TEXT NOT NULL,
                action_class    TEXT NOT NULL,
                selector        TEXT NOT NULL,
                strategy        TEXT NOT NULL,
                confidence      REAL NOT NULL,
                stable          INTEGER NOT NULL,
                dom_fingerprint TEXT NOT NULL,
                hit_count       INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                last_seen_at    TEXT NOT NULL,
                UNIQUE (session_scope, url_pattern, element)
            );
            CREATE INDEX IF NOT EXISTS idx_selector_cache_seen
                ON selector_cache (last_seen_at);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl WarmTier for SqliteWarmTier {
    fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT selector, strategy, confidence, stable, dom_fingerprint,
                    hit_count, created_at, last_seen_at
             FROM selector_cache
             WHERE session_scope = ?1 AND url_pattern = ?2 AND element = ?3",
        )?;
        let mut rows = stmt.query(params![key.session_scope, key.url_pattern, key.element])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let strategy: String = row.get(1)?;
        let fingerprint: String = row.get(4)?;
        let created_at: String = row.get(6)?;
        let last_seen_at: String = row.get(7)?;
        Ok(Some(CacheEntry {
            selector: row.get(0)?,
            strategy: StrategyKind::parse(&strategy),
            confidence: row.get(2)?,
            stable: row.get::<_, i64>(3)? != 0,
            dom_fingerprint: Fingerprint::from_hex(&fingerprint)
                .unwrap_or_else(|| Fingerprint::of_skeleton("")),
            hit_count: row.get::<_, i64>(5)? as u64,
            created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
            last_seen_at: last_seen_at.parse().unwrap_or_else(|_| Utc::now()),
        }))
    }

    fn upsert(&self, key: &CacheKey, entry: &CacheEntry) -> Result<(), CacheError> {
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO selector_cache (
                session_scope, url_pattern, element, action_class, selector,
                strategy, confidence, stable, dom_fingerprint, hit_count,
                created_at, last_seen_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)
            ON CONFLICT (session_scope, url_pattern, element) DO UPDATE SET
                action_class = excluded.action_class,
                selector = excluded.selector,
                strategy = excluded.strategy,
                confidence = excluded.confidence,
                stable = excluded.stable,
                dom_fingerprint = excluded.dom_fingerprint,
                last_seen_at = excluded.last_seen_at",
        )?
        .execute(params![
            key.session_scope,
            key.url_pattern,
            key.element,
            key.action_class.name(),
            entry.selector,
            entry.strategy.name(),
            entry.confidence,
            entry.stable as i64,
            entry.dom_fingerprint.as_str(),
            entry.hit_count as i64,
            entry.created_at.to_rfc3339(),
            entry.last_seen_at.to_rfc3339(),
        ])?;
        Ok(())
    }

    fn bump_hit(&self, key: &CacheKey) -> Result<(), CacheError> {
        let conn = self.conn.lock();
        conn.prepare_cached(
            "UPDATE selector_cache
             SET hit_count = hit_count + 1, last_seen_at = ?4
             WHERE session_scope = ?1 AND url_pattern = ?2 AND element = ?3",
        )?
        .execute(params![
            key.session_scope,
            key.url_pattern,
            key.element,
            Utc::now().to_rfc3339(),
        ])?;
        Ok(())
    }

    fn evict(&self, key: &CacheKey) -> Result<(), CacheError> {
        let conn = self.conn.lock();
        conn.prepare_cached(
            "DELETE FROM selector_cache
             WHERE session_scope = ?1 AND url_pattern = ?2 AND element = ?3",
        )?
        .execute(params![key.session_scope, key.url_pattern, key.element])?;
        Ok(())
    }

    fn purge_expired(&self, retention_days: u64) -> Result<usize, CacheError> {
        let cutoff = (Utc::now() - ChronoDuration::days(retention_days as i64)).to_rfc3339();
        let conn = self.conn.lock();
        let purged = conn
            .prepare_cached("DELETE FROM selector_cache WHERE last_seen_at < ?1")?
            .execute(params![cutoff])?;
        if purged > 0 {
            debug!(purged, "purged expired warm cache rows");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpilot_core_types::{ActionClass, Candidate};

    fn key() -> CacheKey {
        CacheKey::new(
            "scope",
            "https://app.example.org/opp",
            "amount",
            ActionClass::Fill,
        )
        .unwrap()
    }

    fn entry(selector: &str) -> CacheEntry {
        CacheEntry::from_candidate(
            &Candidate::new(selector, StrategyKind::NameAttr),
            Fingerprint::of_skeleton("html|body|form|input!Amount"),
        )
    }

    #[test]
    fn upsert_then_get_round_trips() {
        let tier = SqliteWarmTier::open_in_memory().unwrap();
        let key = key();
        tier.upsert(&key, &entry("[name=\"Amount\"]")).unwrap();

        let loaded = tier.get(&key).unwrap().unwrap();
        assert_eq!(loaded.selector, "[name=\"Amount\"]");
        assert_eq!(loaded.strategy, StrategyKind::NameAttr);
        assert!(loaded.stable);
    }

    #[test]
    fn upsert_replaces_under_unique_constraint() {
        let tier = SqliteWarmTier::open_in_memory().unwrap();
        let key = key();
        tier.upsert(&key, &entry("#input-339")).unwrap();
        tier.upsert(&key, &entry("[name=\"Amount\"]")).unwrap();

        let loaded = tier.get(&key).unwrap().unwrap();
        assert_eq!(loaded.selector, "[name=\"Amount\"]");
    }

    #[test]
    fn bump_hit_increments() {
        let tier = SqliteWarmTier::open_in_memory().unwrap();
        let key = key();
        tier.upsert(&key, &entry("[name=\"Amount\"]")).unwrap();
        tier.bump_hit(&key).unwrap();
        tier.bump_hit(&key).unwrap();
        assert_eq!(tier.get(&key).unwrap().unwrap().hit_count, 2);
    }

    #[test]
    fn evict_removes_the_row() {
        let tier = SqliteWarmTier::open_in_memory().unwrap();
        let key = key();
        tier.upsert(&key, &entry("[name=\"Amount\"]")).unwrap();
        tier.evict(&key).unwrap();
        assert!(tier.get(&key).unwrap().is_none());
    }

    #[test]
    fn purge_honors_retention() {
        let tier = SqliteWarmTier::open_in_memory().unwrap();
        let key = key();
        let mut old = entry("[name=\"Amount\"]");
        old.last_seen_at = Utc::now() - ChronoDuration::days(30);
        tier.upsert(&key, &old).unwrap();

        assert_eq!(tier.purge_expired(7).unwrap(), 1);
        assert!(tier.get(&key).unwrap().is_none());
    }
}
