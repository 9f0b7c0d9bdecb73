// store.rs — SQLite store wrapper.
//
// One `Store` owns one rusqlite connection. The schema is applied on every
// open with CREATE TABLE IF NOT EXISTS, so opening is idempotent and there
// is no separate migration step. WAL mode is enabled for concurrent-reader
// friendliness; the engine itself runs one pipeline at a time, so no
// in-process locking is needed.
//
// Query helpers that read history tolerate a missing table and return the
// empty default — "no history yet" is not an error condition.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::error::StoreError;
use crate::records::{
    ActionRecord, Alert, AlertLevel, ClaimEvent, ClaimEventType, GateCheck, GateStatus,
    LiteratureSearch, SessionTotals,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    id              TEXT PRIMARY KEY,
    project_path    TEXT NOT NULL,
    started_at      TEXT NOT NULL,
    ended_at        TEXT,
    total_actions   INTEGER,
    claims_created  INTEGER,
    claims_killed   INTEGER,
    gates_passed    INTEGER,
    gates_failed    INTEGER
);

CREATE TABLE IF NOT EXISTS action_records (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id      TEXT NOT NULL,
    timestamp       TEXT NOT NULL,
    action_type     TEXT NOT NULL,
    tool_name       TEXT NOT NULL,
    input_summary   TEXT,
    output_summary  TEXT,
    agent_role      TEXT,
    gate_result     TEXT
);
CREATE INDEX IF NOT EXISTS idx_action_records_session
    ON action_records(session_id);

CREATE TABLE IF NOT EXISTS gate_checks (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id      TEXT NOT NULL,
    gate_id         TEXT NOT NULL,
    claim_id        TEXT,
    status          TEXT NOT NULL,
    checks_passed   INTEGER,
    checks_warned   INTEGER,
    checks_failed   INTEGER,
    details         TEXT,
    timestamp       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_gate_checks_claim
    ON gate_checks(claim_id, status);

CREATE TABLE IF NOT EXISTS claim_events (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    claim_id        TEXT NOT NULL,
    session_id      TEXT NOT NULL,
    event_type      TEXT NOT NULL,
    old_status      TEXT,
    new_status      TEXT,
    confidence      REAL,
    timestamp       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_claim_events_claim
    ON claim_events(claim_id);

CREATE TABLE IF NOT EXISTS literature_searches (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id      TEXT NOT NULL,
    query           TEXT NOT NULL,
    sources         TEXT NOT NULL,
    search_layer    TEXT NOT NULL,
    timestamp       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_literature_session
    ON literature_searches(session_id);

CREATE TABLE IF NOT EXISTS observer_alerts (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    project_path    TEXT NOT NULL,
    level           TEXT NOT NULL,
    message         TEXT NOT NULL,
    resolved        INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_alerts_project
    ON observer_alerts(project_path, resolved);
";

/// SQLite-backed store for the enforcement pipeline.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database at the given path and apply the schema.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::DirFailed {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(&path).map_err(|source| StoreError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        Self::init(conn)
    }

    /// Open an in-memory database. Used by tests and by degraded runs
    /// where the on-disk store cannot be created.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        // WAL gives concurrent host processes crash-safe reads; the
        // pragma returns a row, so query it instead of execute.
        let _: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    // ── Sessions ─────────────────────────────────────────────────

    /// Insert a session row if one doesn't exist yet.
    ///
    /// Action records reference sessions, so the engine calls this before
    /// logging anything for a session id it hasn't seen.
    pub fn ensure_session(&self, session_id: &str, project_path: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO sessions (id, project_path, started_at) VALUES (?1, ?2, ?3)",
            params![session_id, project_path, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Close out a session, writing aggregate counters.
    ///
    /// `None` counters leave the existing column value untouched.
    pub fn end_session(&self, session_id: &str, totals: &SessionTotals) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE sessions SET
                ended_at = ?1,
                total_actions  = COALESCE(?2, total_actions),
                claims_created = COALESCE(?3, claims_created),
                claims_killed  = COALESCE(?4, claims_killed),
                gates_passed   = COALESCE(?5, gates_passed),
                gates_failed   = COALESCE(?6, gates_failed)
             WHERE id = ?7",
            params![
                Utc::now().to_rfc3339(),
                totals.total_actions.map(|n| n as i64),
                totals.claims_created.map(|n| n as i64),
                totals.claims_killed.map(|n| n as i64),
                totals.gates_passed.map(|n| n as i64),
                totals.gates_failed.map(|n| n as i64),
                session_id,
            ],
        )?;
        Ok(())
    }

    // ── Action records ───────────────────────────────────────────

    pub fn insert_action(&self, record: &ActionRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO action_records
                (session_id, timestamp, action_type, tool_name,
                 input_summary, output_summary, agent_role, gate_result)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.session_id,
                record.timestamp.to_rfc3339(),
                record.action_type,
                record.tool_name,
                record.input_summary,
                record.output_summary,
                record.agent_role,
                record.gate_result.map(GateStatus::as_str),
            ],
        )?;
        Ok(())
    }

    /// Number of actions recorded for a session. Missing table → 0.
    pub fn action_count(&self, session_id: &str) -> Result<u64, StoreError> {
        let result = self.conn.query_row(
            "SELECT COUNT(*) FROM action_records WHERE session_id = ?1",
            params![session_id],
            |row| row.get::<_, i64>(0),
        );
        match result {
            Ok(n) => Ok(n.max(0) as u64),
            Err(err) if is_missing_table(&err) => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    /// Action types for a session grouped by frequency, most common first.
    ///
    /// Used by the observer's phase-drift heuristic. Missing table → empty.
    pub fn action_type_counts(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<(String, u64)>, StoreError> {
        let mut stmt = match self.conn.prepare(
            "SELECT action_type, COUNT(*) AS cnt FROM action_records
             WHERE session_id = ?1
             GROUP BY action_type
             ORDER BY cnt DESC
             LIMIT ?2",
        ) {
            Ok(stmt) => stmt,
            Err(err) if is_missing_table(&err) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let rows = stmt.query_map(params![session_id, limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.max(0) as u64))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ── Gate checks ──────────────────────────────────────────────

    pub fn insert_gate_check(&self, check: &GateCheck) -> Result<(), StoreError> {
        let details = check
            .details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.conn.execute(
            "INSERT INTO gate_checks
                (session_id, gate_id, claim_id, status,
                 checks_passed, checks_warned, checks_failed, details, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                check.session_id,
                check.gate_id,
                check.claim_id,
                check.status.as_str(),
                check.checks_passed,
                check.checks_warned,
                check.checks_failed,
                details,
                check.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Distinct gate ids already marked PASS for a claim. Missing table → empty.
    pub fn passed_gate_ids(&self, claim_id: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = match self.conn.prepare(
            "SELECT DISTINCT gate_id FROM gate_checks
             WHERE claim_id = ?1 AND status = 'PASS'",
        ) {
            Ok(stmt) => stmt,
            Err(err) if is_missing_table(&err) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let rows = stmt.query_map(params![claim_id], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ── Claim events ─────────────────────────────────────────────

    pub fn insert_claim_event(&self, event: &ClaimEvent) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO claim_events
                (claim_id, session_id, event_type, old_status, new_status, confidence, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.claim_id,
                event.session_id,
                event.event_type.as_str(),
                event.old_status,
                event.new_status,
                event.confidence,
                event.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Whether any lifecycle event exists for a claim. Missing table → false.
    pub fn has_claim_events(&self, claim_id: &str) -> Result<bool, StoreError> {
        let result = self.conn.query_row(
            "SELECT 1 FROM claim_events WHERE claim_id = ?1 LIMIT 1",
            params![claim_id],
            |_| Ok(()),
        );
        match result {
            Ok(()) => Ok(true),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
            Err(err) if is_missing_table(&err) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// All events for a claim, oldest first. Missing table → empty.
    pub fn claim_history(&self, claim_id: &str) -> Result<Vec<ClaimEvent>, StoreError> {
        let mut stmt = match self.conn.prepare(
            "SELECT claim_id, session_id, event_type, old_status, new_status, confidence, timestamp
             FROM claim_events WHERE claim_id = ?1 ORDER BY timestamp ASC",
        ) {
            Ok(stmt) => stmt,
            Err(err) if is_missing_table(&err) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let rows = stmt.query_map(params![claim_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<f64>>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (claim_id, session_id, kind, old_status, new_status, confidence, ts) = row?;
            // Rows written by older builds may carry event types this build
            // doesn't know; skip them rather than failing the replay.
            let Some(event_type) = ClaimEventType::parse(&kind) else {
                tracing::warn!(%claim_id, event_type = %kind, "skipping unknown claim event type");
                continue;
            };
            events.push(ClaimEvent {
                claim_id,
                session_id,
                event_type,
                old_status,
                new_status,
                confidence,
                timestamp: parse_timestamp("claim_events", &ts)?,
            });
        }
        Ok(events)
    }

    // ── Literature searches ──────────────────────────────────────

    pub fn insert_literature_search(&self, search: &LiteratureSearch) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO literature_searches
                (session_id, query, sources, search_layer, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                search.session_id,
                search.query,
                serde_json::to_string(&search.sources)?,
                search.search_layer.as_str(),
                search.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Number of literature searches in a session. Missing table → 0.
    pub fn literature_search_count(&self, session_id: &str) -> Result<u64, StoreError> {
        let result = self.conn.query_row(
            "SELECT COUNT(*) FROM literature_searches WHERE session_id = ?1",
            params![session_id],
            |row| row.get::<_, i64>(0),
        );
        match result {
            Ok(n) => Ok(n.max(0) as u64),
            Err(err) if is_missing_table(&err) => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    // ── Observer alerts ──────────────────────────────────────────

    pub fn insert_alert(&self, alert: &Alert) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO observer_alerts (project_path, level, message, resolved, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                alert.project_path,
                alert.level.as_str(),
                alert.message,
                alert.resolved as i64,
                alert.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Unresolved alerts for a project, worst level first. Missing table → empty.
    pub fn unresolved_alerts(&self, project_path: &str) -> Result<Vec<Alert>, StoreError> {
        let mut stmt = match self.conn.prepare(
            "SELECT project_path, level, message, resolved, created_at
             FROM observer_alerts
             WHERE project_path = ?1 AND resolved = 0
             ORDER BY created_at DESC",
        ) {
            Ok(stmt) => stmt,
            Err(err) if is_missing_table(&err) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let rows = stmt.query_map(params![project_path], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut alerts = Vec::new();
        for row in rows {
            let (project_path, level, message, resolved, created_at) = row?;
            let level = AlertLevel::parse(&level).unwrap_or(AlertLevel::Warn);
            alerts.push(Alert {
                project_path,
                level,
                message,
                resolved: resolved != 0,
                created_at: parse_timestamp("observer_alerts", &created_at)?,
            });
        }
        // Worst first so callers can surface the one that matters.
        alerts.sort_by(|a, b| b.level.cmp(&a.level));
        Ok(alerts)
    }
}

/// Whether a rusqlite error means the queried table doesn't exist yet.
fn is_missing_table(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("no such table")
    )
}

fn parse_timestamp(table: &'static str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::CorruptTimestamp {
            table,
            value: value.to_string(),
        })
}
