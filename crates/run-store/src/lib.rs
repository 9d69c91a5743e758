//! Run store: verdicts, step rows, and forensic artifacts
//!
//! One writer per run by ownership; shells read through the same store.
//! Artifacts are files on disk; records carry their paths.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags};
use thiserror::Error;
use tracing::debug;
use webpilot_core_types::{
    ArtifactKind, ArtifactRecord, RcaClass, ReqId, RunRecord, StepRecord, StepStatus,
    StrategyKind, Verdict,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("run store error: {0}")]
    Db(String),

    #[error("artifact io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Db(err.to_string())
    }
}

pub struct RunStore {
    conn: Mutex<Connection>,
    artifacts_dir: PathBuf,
}

impl RunStore {
    pub fn open(db_path: &Path, artifacts_dir: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&artifacts_dir)?;
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        Self::init(conn, artifacts_dir)
    }

    pub fn open_in_memory(artifacts_dir: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&artifacts_dir)?;
        Self::init(Connection::open_in_memory()?, artifacts_dir)
    }

    fn init(conn: Connection, artifacts_dir: PathBuf) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS runs (
                req_id         TEXT PRIMARY KEY,
                url            TEXT NOT NULL,
                verdict        TEXT NOT NULL,
                steps_total    INTEGER NOT NULL,
                steps_executed INTEGER NOT NULL,
                heal_rounds    INTEGER NOT NULL,
                started_at     TEXT NOT NULL,
                ended_at       TEXT NOT NULL,
                rca_class      TEXT NOT NULL,
                rca_detail     TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS run_steps (
                req_id      TEXT NOT NULL,
                idx         INTEGER NOT NULL,
                element     TEXT NOT NULL,
                action      TEXT NOT NULL,
                selector    TEXT,
                strategy    TEXT,
                status      TEXT NOT NULL,
                heal_rounds INTEGER NOT NULL,
                latency_ms  INTEGER NOT NULL,
                PRIMARY KEY (req_id, idx)
            );
            CREATE TABLE IF NOT EXISTS run_artifacts (
                req_id     TEXT NOT NULL,
                kind       TEXT NOT NULL,
                path       TEXT NOT NULL,
                created_at TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            artifacts_dir,
        })
    }

    /// Persist the final record; step rows are replaced wholesale (the
    /// owning run is the only writer for its `req_id`).
    pub fn persist_run(&self, record: &RunRecord) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO runs (
                req_id, url, verdict, steps_total, steps_executed,
                heal_rounds, started_at, ended_at, rca_class, rca_detail
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                record.req_id.0,
                record.url,
                record.verdict.name(),
                record.steps_total as i64,
                record.steps_executed as i64,
                record.heal_rounds as i64,
                record.started_at.to_rfc3339(),
                record.ended_at.to_rfc3339(),
                record.rca_class.name(),
                record.rca_detail,
            ],
        )?;
        tx.execute(
            "DELETE FROM run_steps WHERE req_id = ?1",
            params![record.req_id.0],
        )?;
        for step in &record.steps {
            tx.execute(
                "INSERT INTO run_steps (
                    req_id, idx, element, action, selector, strategy,
                    status, heal_rounds, latency_ms
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
                params![
                    record.req_id.0,
                    step.idx as i64,
                    step.element,
                    step.action,
                    step.selector,
                    step.strategy.as_ref().map(|s| s.name().to_string()),
                    status_name(step.status),
                    step.heal_rounds as i64,
                    step.latency_ms as i64,
                ],
            )?;
        }
        for artifact in &record.artifacts {
            tx.execute(
                "INSERT INTO run_artifacts (req_id, kind, path, created_at)
                 VALUES (?1,?2,?3,?4)",
                params![
                    record.req_id.0,
                    artifact.kind.name(),
                    artifact.path,
                    artifact.created_at.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        debug!(req_id = %record.req_id, verdict = record.verdict.name(), "run persisted");
        Ok(())
    }

    pub fn load_run(&self, req_id: &ReqId) -> Result<Option<RunRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT url, verdict, steps_total, steps_executed, heal_rounds,
                    started_at, ended_at, rca_class, rca_detail
             FROM runs WHERE req_id = ?1",
        )?;
        let mut rows = stmt.query(params![req_id.0])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let verdict: String = row.get(1)?;
        let rca: String = row.get(7)?;
        let started: String = row.get(5)?;
        let ended: String = row.get(6)?;
        let mut record = RunRecord {
            req_id: req_id.clone(),
            url: row.get(0)?,
            verdict: parse_verdict(&verdict),
            steps_total: row.get::<_, i64>(2)? as usize,
            steps_executed: row.get::<_, i64>(3)? as usize,
            heal_rounds: row.get::<_, i64>(4)? as u32,
            started_at: started.parse().unwrap_or_else(|_| Utc::now()),
            ended_at: ended.parse().unwrap_or_else(|_| Utc::now()),
            rca_class: parse_rca(&rca),
            rca_detail: row.get(8)?,
            steps: Vec::new(),
            artifacts: Vec::new(),
        };
        drop(rows);

        let mut steps_stmt = conn.prepare_cached(
            "SELECT idx, element, action, selector, strategy, status,
                    heal_rounds, latency_ms
             FROM run_steps WHERE req_id = ?1 ORDER BY idx",
        )?;
        record.steps = steps_stmt
            .query_map(params![req_id.0], |row| {
                let strategy: Option<String> = row.get(4)?;
                let status: String = row.get(5)?;
                Ok(StepRecord {
                    idx: row.get::<_, i64>(0)? as usize,
                    element: row.get(1)?,
                    action: row.get(2)?,
                    selector: row.get(3)?,
                    strategy: strategy.map(|s| StrategyKind::parse(&s)),
                    status: parse_status(&status),
                    heal_rounds: row.get::<_, i64>(6)? as u32,
                    latency_ms: row.get::<_, i64>(7)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut artifacts_stmt = conn.prepare_cached(
            "SELECT kind, path, created_at FROM run_artifacts WHERE req_id = ?1",
        )?;
        record.artifacts = artifacts_stmt
            .query_map(params![req_id.0], |row| {
                let kind: String = row.get(0)?;
                let created: String = row.get(2)?;
                Ok(ArtifactRecord {
                    kind: parse_artifact_kind(&kind),
                    path: row.get(1)?,
                    created_at: created.parse().unwrap_or_else(|_| Utc::now()),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(record))
    }

    /// Write an artifact file and return its record. The caller attaches
    /// the record to the run before persisting.
    pub fn save_artifact(
        &self,
        req_id: &ReqId,
        kind: ArtifactKind,
        bytes: &[u8],
    ) -> Result<ArtifactRecord, StoreError> {
        let dir = self.artifacts_dir.join(&req_id.0);
        fs::create_dir_all(&dir)?;
        let extension = match kind {
            ArtifactKind::Screenshot => "png",
            ArtifactKind::HtmlSnapshot => "html",
            ArtifactKind::GeneratedScript => "rs",
        };
        let filename = format!("{}-{}.{}", kind.name(), Utc::now().timestamp_millis(), extension);
        let path = dir.join(filename);
        fs::write(&path, bytes)?;
        Ok(ArtifactRecord {
            kind,
            path: path.to_string_lossy().into_owned(),
            created_at: Utc::now(),
        })
    }
}

fn status_name(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Ok => "ok",
        StepStatus::Failed => "failed",
        StepStatus::Skipped => "skipped",
    }
}

fn parse_status(value: &str) -> StepStatus {
    match value {
        "ok" => StepStatus::Ok,
        "failed" => StepStatus::Failed,
        _ => StepStatus::Skipped,
    }
}

fn parse_verdict(value: &str) -> Verdict {
    match value {
        "PASS" => Verdict::Pass,
        "FAIL" => Verdict::Fail,
        "BLOCKED" => Verdict::Blocked,
        _ => Verdict::Partial,
    }
}

fn parse_rca(value: &str) -> RcaClass {
    match value {
        "selector_drift" => RcaClass::SelectorDrift,
        "timing_instability" => RcaClass::TimingInstability,
        "visibility_issue" => RcaClass::VisibilityIssue,
        "enablement_issue" => RcaClass::EnablementIssue,
        "assertion_mismatch" => RcaClass::AssertionMismatch,
        "data_issue" => RcaClass::DataIssue,
        "env_fault" => RcaClass::EnvFault,
        "blocked" => RcaClass::Blocked,
        _ => RcaClass::Unknown,
    }
}

fn parse_artifact_kind(value: &str) -> ArtifactKind {
    match value {
        "screenshot" => ArtifactKind::Screenshot,
        "html_snapshot" => ArtifactKind::HtmlSnapshot,
        _ => ArtifactKind::GeneratedScript,
    }
}
