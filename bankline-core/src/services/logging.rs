//! Logging service - structured event logging to DuckDB
//!
//! Stores events in logs.duckdb, next to the ledger database. Only event
//! names, command names, outcome tags and error kinds are recorded. Names,
//! amounts, balances and credentials are never logged.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use duckdb::Connection;
use serde::{Deserialize, Serialize};

use crate::domain::result::Error;
use crate::log_migrations::LOG_MIGRATIONS;

use super::migration::MigrationService;

/// Counter for generating unique IDs within the same millisecond
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

const SELECT_LOGS: &str = r#"
    SELECT id, timestamp, entry_point, app_version, platform,
           event, command, outcome, error_message
    FROM sys_logs
"#;

/// Current unix time in milliseconds
fn now_ms() -> Result<i64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| anyhow!("System clock before unix epoch: {}", e))?;
    Ok(elapsed.as_millis() as i64)
}

/// Timestamp in the lower 48 bits, per-process counter in the upper 16
fn generate_id(timestamp_ms: i64) -> u64 {
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    ((timestamp_ms as u64) << 16) | counter
}

fn detect_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}

/// Which front end produced the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    Cli,
    Embedded,
}

impl EntryPoint {
    fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Cli => "cli",
            EntryPoint::Embedded => "embedded",
        }
    }
}

/// A log event to be recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl LogEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            command: None,
            outcome: None,
            error_message: None,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Outcome tag, e.g. "ok" or an error kind
    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Record a ledger error by kind only
    ///
    /// The error's display text can carry amounts and balances, so only
    /// the stable kind tag is kept.
    pub fn with_ledger_error(self, error: &Error) -> Self {
        let kind = error.kind();
        self.with_outcome(kind).with_error(kind)
    }
}

/// A log entry as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: i64,
    pub entry_point: String,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub command: Option<String>,
    pub outcome: Option<String>,
    pub error_message: Option<String>,
}

impl LogEntry {
    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            entry_point: row.get(2)?,
            app_version: row.get(3)?,
            platform: row.get(4)?,
            event: row.get(5)?,
            command: row.get(6)?,
            outcome: row.get(7)?,
            error_message: row.get(8)?,
        })
    }
}

/// Service for structured event logging
pub struct LoggingService {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    entry_point: EntryPoint,
    app_version: String,
    platform: &'static str,
}

impl LoggingService {
    /// Open or create logs.duckdb in the bankline directory and migrate it
    pub fn new(
        bankline_dir: &Path,
        entry_point: EntryPoint,
        app_version: impl Into<String>,
    ) -> Result<Self> {
        let db_path = bankline_dir.join("logs.duckdb");
        let conn = Connection::open(&db_path)?;
        MigrationService::new(&conn, LOG_MIGRATIONS).run_pending()?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            entry_point,
            app_version: app_version.into(),
            platform: detect_platform(),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))
    }

    /// Record an event; entry point, version and platform are filled in
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let conn = self.lock()?;
        let timestamp = now_ms()?;

        conn.execute(
            r#"
            INSERT INTO sys_logs (
                id, timestamp, entry_point, app_version, platform,
                event, command, outcome, error_message
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            duckdb::params![
                generate_id(timestamp),
                timestamp,
                self.entry_point.as_str(),
                &self.app_version,
                self.platform,
                &event.event,
                &event.command,
                &event.outcome,
                &event.error_message,
            ],
        )?;

        Ok(())
    }

    pub fn log_event(&self, event: &str) -> Result<()> {
        self.log(LogEvent::new(event))
    }

    /// Log a CLI command execution
    pub fn log_command(&self, command: &str) -> Result<()> {
        self.log(LogEvent::new("command_executed").with_command(command))
    }

    pub fn log_error(&self, event: &str, message: &str) -> Result<()> {
        self.log(LogEvent::new(event).with_error(message))
    }

    fn query(&self, filter: &str, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.lock()?;
        let sql = format!("{} {} ORDER BY timestamp DESC, id DESC LIMIT ?", SELECT_LOGS, filter);
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map([limit as i64], LogEntry::from_row)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Most recent entries, newest first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.query("", limit)
    }

    /// Most recent entries that carry an error
    pub fn get_errors(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.query("WHERE error_message IS NOT NULL", limit)
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.lock()?;
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM sys_logs", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete logs older than the given unix ms timestamp
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM sys_logs WHERE timestamp < ?", [timestamp_ms])?;
        Ok(deleted as u64)
    }

    /// Delete every log entry
    pub fn clear(&self) -> Result<u64> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM sys_logs", [])?;
        Ok(deleted as u64)
    }

    /// Copy the logs database for troubleshooting
    pub fn export(&self, output_path: &Path) -> Result<PathBuf> {
        let conn = self.lock()?;
        conn.execute("CHECKPOINT", [])?;
        std::fs::copy(&self.db_path, output_path)?;
        Ok(output_path.to_path_buf())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AccountId;
    use rust_decimal::Decimal;
    use tempfile::tempdir;

    #[test]
    fn test_logging_service_creation() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Cli, "0.1.0").unwrap();
        assert!(service.db_path().exists());
    }

    #[test]
    fn test_log_command() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Cli, "0.1.0").unwrap();

        service.log_command("deposit").unwrap();

        let entries = service.get_recent(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, "command_executed");
        assert_eq!(entries[0].command, Some("deposit".to_string()));
        assert_eq!(entries[0].entry_point, "cli");
        assert_eq!(entries[0].app_version, "0.1.0");
    }

    #[test]
    fn test_ledger_error_logs_kind_only() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Embedded, "0.1.0").unwrap();

        let error = Error::InsufficientFunds {
            account_id: AccountId::new(1001),
            requested: Decimal::from(1500),
            available: Decimal::from(1200),
        };
        service
            .log(
                LogEvent::new("transaction_rejected")
                    .with_command("withdraw")
                    .with_ledger_error(&error),
            )
            .unwrap();

        let errors = service.get_errors(10).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].entry_point, "embedded");
        assert_eq!(errors[0].outcome, Some("insufficient_funds".to_string()));

        let message = errors[0].error_message.clone().unwrap();
        assert!(!message.contains("1500"));
        assert!(!message.contains("1001"));
    }

    #[test]
    fn test_count_delete_and_clear() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Cli, "0.1.0").unwrap();

        service.log_event("event1").unwrap();
        service.log_event("event2").unwrap();
        service.log_error("event3", "boom").unwrap();
        assert_eq!(service.count().unwrap(), 3);

        assert_eq!(service.delete_before(0).unwrap(), 0);
        assert_eq!(service.clear().unwrap(), 3);
        assert_eq!(service.count().unwrap(), 0);
    }

    #[test]
    fn test_reopen_keeps_entries() {
        let dir = tempdir().unwrap();
        {
            let service = LoggingService::new(dir.path(), EntryPoint::Cli, "0.1.0").unwrap();
            service.log_event("first").unwrap();
        }
        let service = LoggingService::new(dir.path(), EntryPoint::Cli, "0.1.0").unwrap();
        assert_eq!(service.count().unwrap(), 1);
    }

    #[test]
    fn test_export() {
        let dir = tempdir().unwrap();
        let service = LoggingService::new(dir.path(), EntryPoint::Cli, "0.1.0").unwrap();
        service.log_event("test_event").unwrap();

        let copy_dir = tempdir().unwrap();
        let export_path = copy_dir.path().join("logs.duckdb");
        assert_eq!(service.export(&export_path).unwrap(), export_path);

        let copy = LoggingService::new(copy_dir.path(), EntryPoint::Cli, "0.1.0").unwrap();
        assert_eq!(copy.count().unwrap(), 1);
    }
}
