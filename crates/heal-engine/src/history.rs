//! Heal history store
//!
//! Append-only record of per-element strategy outcomes. The aggregation
//! feeds `best_strategies`, which orders reprobe attempts by success rate
//! with recency as the tiebreak. Writes happen after every attempt
//! regardless of outcome; write failures are logged, never fatal.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use webpilot_core_types::{HealRecord, HealRecordOutcome, StrategyKind};

use crate::HealError;

#[derive(Clone, Debug, PartialEq)]
pub struct StrategyStat {
    pub strategy: StrategyKind,
    pub attempts: u64,
    pub successes: u64,
    pub success_rate: f64,
    pub last_used: DateTime<Utc>,
}

pub trait HealHistory: Send + Sync {
    fn record(&self, record: &HealRecord) -> Result<(), HealError>;

    /// Strategies for `(url_pattern, element)` ordered by success rate,
    /// ties broken by recency.
    fn best_strategies(
        &self,
        url_pattern: &str,
        element: &str,
        limit: usize,
    ) -> Result<Vec<StrategyStat>, HealError>;
}

/// Store used when memory is disabled: remembers nothing, ranks nothing.
#[derive(Default)]
pub struct NoopHealHistory;

impl HealHistory for NoopHealHistory {
    fn record(&self, _record: &HealRecord) -> Result<(), HealError> {
        Ok(())
    }

    fn best_strategies(
        &self,
        _url_pattern: &str,
        _element: &str,
        _limit: usize,
    ) -> Result<Vec<StrategyStat>, HealError> {
        Ok(Vec::new())
    }
}

pub struct SqliteHealHistory {
    conn: Mutex<Connection>,
}

impl SqliteHealHistory {
    pub fn open(path: &Path) -> Result<Self, HealError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| HealError::History(e.to_string()))?;
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, HealError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, HealError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS heal_history (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                url_pattern TEXT NOT NULL,
                element     TEXT NOT NULL,
                strategy    TEXT NOT NULL,
                outcome     TEXT NOT NULL,
                latency_ms  INTEGER NOT NULL,
                heal_round  INTEGER NOT NULL,
                created_at  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_heal_history_key
                ON heal_history (url_pattern, element);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl HealHistory for SqliteHealHistory {
    fn record(&self, record: &HealRecord) -> Result<(), HealError> {
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO heal_history (
                url_pattern, element, strategy, outcome, latency_ms,
                heal_round, created_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7)",
        )?
        .execute(params![
            record.url_pattern,
            record.element,
            record.strategy.name(),
            record.outcome.name(),
            record.latency_ms as i64,
            record.heal_round as i64,
            record.created_at.to_rfc3339(),
        ])?;
        Ok(())
    }

    fn best_strategies(
        &self,
        url_pattern: &str,
        element: &str,
        limit: usize,
    ) -> Result<Vec<StrategyStat>, HealError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT strategy,
                    COUNT(*) AS attempts,
                    SUM(CASE WHEN outcome = 'success' THEN 1 ELSE 0 END) AS successes,
                    MAX(created_at) AS last_used
             FROM heal_history
             WHERE url_pattern = ?1 AND element = ?2
             GROUP BY strategy
             ORDER BY CAST(successes AS REAL) / attempts DESC, last_used DESC
             LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![url_pattern, element, limit as i64], |row| {
                let strategy: String = row.get(0)?;
                let attempts: i64 = row.get(1)?;
                let successes: i64 = row.get(2)?;
                let last_used: String = row.get(3)?;
                Ok((strategy, attempts, successes, last_used))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .map(|(strategy, attempts, successes, last_used)| StrategyStat {
                strategy: StrategyKind::parse(&strategy),
                attempts: attempts as u64,
                successes: successes as u64,
                success_rate: if attempts > 0 {
                    successes as f64 / attempts as f64
                } else {
                    0.0
                },
                last_used: last_used.parse().unwrap_or_else(|_| Utc::now()),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(strategy: StrategyKind, outcome: HealRecordOutcome) -> HealRecord {
        HealRecord {
            url_pattern: "https://app.example.org/opp".to_string(),
            element: "amount".to_string(),
            strategy,
            outcome,
            latency_ms: 40,
            heal_round: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn ranks_by_success_rate() {
        let history = SqliteHealHistory::open_in_memory().unwrap();
        // name_attr: 2/2, role_name: 1/3.
        history.record(&record(StrategyKind::NameAttr, HealRecordOutcome::Success)).unwrap();
        history.record(&record(StrategyKind::NameAttr, HealRecordOutcome::Success)).unwrap();
        history.record(&record(StrategyKind::RoleName, HealRecordOutcome::Success)).unwrap();
        history.record(&record(StrategyKind::RoleName, HealRecordOutcome::Fail)).unwrap();
        history.record(&record(StrategyKind::RoleName, HealRecordOutcome::Fail)).unwrap();

        let stats = history
            .best_strategies("https://app.example.org/opp", "amount", 5)
            .unwrap();
        assert_eq!(stats[0].strategy, StrategyKind::NameAttr);
        assert_eq!(stats[0].success_rate, 1.0);
        assert_eq!(stats[1].strategy, StrategyKind::RoleName);
        assert!(stats[1].success_rate < 0.5);
    }

    #[test]
    fn unknown_elements_rank_nothing() {
        let history = SqliteHealHistory::open_in_memory().unwrap();
        let stats = history.best_strategies("https://x.example", "ghost", 5).unwrap();
        assert!(stats.is_empty());
    }

    #[test]
    fn noop_history_is_silent() {
        let history = NoopHealHistory;
        history
            .record(&record(StrategyKind::NameAttr, HealRecordOutcome::Success))
            .unwrap();
        assert!(history.best_strategies("x", "y", 3).unwrap().is_empty());
    }
}
