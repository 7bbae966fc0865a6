//! SQLite persistence for generated emails and test results

use crate::sink::ArtifactSink;
use crate::types::{GeneratedEmail, RunStatus, TestResult};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Database wrapper for result persistence
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path.as_ref())?;

        // Concurrent runs write results from separate tasks
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        info!("Opened database at {:?}", path.as_ref());
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            -- Rendered emails, append-only
            CREATE TABLE IF NOT EXISTS generated_emails (
                id TEXT PRIMARY KEY,
                template_id TEXT NOT NULL,
                locale TEXT NOT NULL,
                html TEXT NOT NULL,
                screenshot TEXT,
                generated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_generated_emails_template ON generated_emails(template_id);

            -- Scenario run history, append-only
            CREATE TABLE IF NOT EXISTS test_results (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                scenario_id TEXT NOT NULL,
                status TEXT NOT NULL,
                executed_at INTEGER NOT NULL,
                duration_ms INTEGER NOT NULL,
                error_message TEXT,
                screenshot_path TEXT,
                logs TEXT NOT NULL DEFAULT '[]',
                degraded INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_test_results_scenario ON test_results(scenario_id);
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    fn email_from_row(row: &Row<'_>) -> rusqlite::Result<RawEmail> {
        Ok(RawEmail {
            id: row.get(0)?,
            template_id: row.get(1)?,
            locale: row.get(2)?,
            html: row.get(3)?,
            screenshot: row.get(4)?,
            generated_at: row.get(5)?,
        })
    }

    fn result_from_row(row: &Row<'_>) -> rusqlite::Result<RawResult> {
        Ok(RawResult {
            id: row.get(0)?,
            scenario_id: row.get(1)?,
            status: row.get(2)?,
            executed_at: row.get(3)?,
            duration_ms: row.get(4)?,
            error_message: row.get(5)?,
            screenshot_path: row.get(6)?,
            logs: row.get(7)?,
            degraded: row.get(8)?,
        })
    }
}

impl ArtifactSink for Database {
    fn record_email(&self, email: &GeneratedEmail) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO generated_emails (id, template_id, locale, html, screenshot, generated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                email.id.to_string(),
                email.template_id,
                email.locale,
                email.html,
                email.screenshot,
                email.generated_at.timestamp_millis(),
            ],
        )?;
        debug!("Inserted generated email {} ({})", email.id, email.locale);
        Ok(())
    }

    fn emails_for_template(&self, template_id: &str) -> Result<Vec<GeneratedEmail>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, template_id, locale, html, screenshot, generated_at
             FROM generated_emails WHERE template_id = ?1 ORDER BY generated_at DESC",
        )?;

        let rows = stmt.query_map(params![template_id], Self::email_from_row)?;

        let mut emails = Vec::new();
        for row in rows {
            emails.push(row?.parse()?);
        }
        Ok(emails)
    }

    fn record_result(&self, result: &TestResult) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO test_results
             (id, scenario_id, status, executed_at, duration_ms, error_message, screenshot_path, logs, degraded)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                result.id.to_string(),
                result.scenario_id,
                result.status.as_str(),
                result.executed_at.timestamp_millis(),
                result.duration_ms as i64,
                result.error_message,
                result.screenshot_path,
                serde_json::to_string(&result.logs)?,
                result.degraded,
            ],
        )?;
        debug!("Inserted test result {} for scenario {}", result.id, result.scenario_id);
        Ok(())
    }

    fn results_for_scenario(&self, scenario_id: &str) -> Result<Vec<TestResult>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, scenario_id, status, executed_at, duration_ms, error_message, screenshot_path, logs, degraded
             FROM test_results WHERE scenario_id = ?1 ORDER BY executed_at DESC, seq DESC",
        )?;

        let rows = stmt.query_map(params![scenario_id], Self::result_from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?.parse()?);
        }
        Ok(results)
    }
}

struct RawEmail {
    id: String,
    template_id: String,
    locale: String,
    html: String,
    screenshot: Option<String>,
    generated_at: i64,
}

impl RawEmail {
    fn parse(self) -> Result<GeneratedEmail> {
        Ok(GeneratedEmail {
            id: parse_uuid(&self.id)?,
            template_id: self.template_id,
            locale: self.locale,
            html: self.html,
            screenshot: self.screenshot,
            generated_at: parse_millis(self.generated_at)?,
        })
    }
}

struct RawResult {
    id: String,
    scenario_id: String,
    status: String,
    executed_at: i64,
    duration_ms: i64,
    error_message: Option<String>,
    screenshot_path: Option<String>,
    logs: String,
    degraded: bool,
}

impl RawResult {
    fn parse(self) -> Result<TestResult> {
        Ok(TestResult {
            id: parse_uuid(&self.id)?,
            scenario_id: self.scenario_id,
            status: self.status.parse::<RunStatus>()?,
            executed_at: parse_millis(self.executed_at)?,
            duration_ms: self.duration_ms.max(0) as u64,
            error_message: self.error_message,
            screenshot_path: self.screenshot_path,
            logs: serde_json::from_str(&self.logs)?,
            degraded: self.degraded,
        })
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Internal(format!("bad id {}: {}", raw, e)))
}

fn parse_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| Error::Internal(format!("timestamp out of range: {}", millis)))
}
