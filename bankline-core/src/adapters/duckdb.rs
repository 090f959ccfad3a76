//! DuckDB account store implementation

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use duckdb::{params, Connection};
use rust_decimal::Decimal;

use crate::domain::result::PersistError;
use crate::domain::{Account, AccountId, AccountVariant, Credential};
use crate::migrations::MIGRATIONS;
use crate::ports::AccountStore;
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Money columns hold exact `Decimal` text
const SELECT_ACCOUNTS: &str = "SELECT account_id, name, credential, balance,
        variant, overdraft_limit, created_at
 FROM sys_accounts";

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock on file")
}

/// Raw column values of one `sys_accounts` row
struct AccountRow {
    id: i64,
    name: String,
    credential: String,
    balance: String,
    variant: String,
    overdraft_limit: Option<String>,
    created_at: String,
}

impl AccountRow {
    fn from_row(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            credential: row.get(2)?,
            balance: row.get(3)?,
            variant: row.get(4)?,
            overdraft_limit: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_account(self) -> Result<Account, PersistError> {
        let id = AccountId::new(self.id);
        let balance = parse_decimal(&self.balance, id, "balance")?;

        let variant = match (self.variant.as_str(), self.overdraft_limit.as_deref()) {
            ("standard", _) => AccountVariant::Standard,
            ("overdraft", Some(raw)) => {
                let limit = parse_decimal(raw, id, "overdraft_limit")?;
                AccountVariant::overdraft(limit).map_err(|e| {
                    PersistError::Corrupt(format!("account {}: {}", id, e))
                })?
            }
            ("overdraft", None) => {
                return Err(PersistError::Corrupt(format!(
                    "account {}: overdraft account without a limit",
                    id
                )))
            }
            (other, _) => {
                return Err(PersistError::Corrupt(format!(
                    "account {}: unknown variant {:?}",
                    id, other
                )))
            }
        };

        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| PersistError::Corrupt(format!("account {}: created_at: {}", id, e)))?;

        Ok(Account::restore(
            id,
            self.name,
            Credential::new(self.credential),
            balance,
            variant,
            created_at,
        ))
    }
}

fn parse_decimal(raw: &str, id: AccountId, column: &str) -> Result<Decimal, PersistError> {
    Decimal::from_str(raw.trim())
        .map(|d| d.normalize())
        .map_err(|e| PersistError::Corrupt(format!("account {}: {}: {}", id, column, e)))
}

/// DuckDB-backed `AccountStore`
pub struct DuckDbAccountStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbAccountStore {
    /// Open (or create) the ledger database file
    ///
    /// Opening retries with exponential backoff on file locking errors,
    /// which show up when a second process opens the same file.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[bankline] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    /// Database that lives only as long as this value
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading stays off; nothing here needs extensions
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    /// Path of the database file, `None` for in-memory stores
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run pending migrations and report what was applied
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))?;
        MigrationService::new(&conn, MIGRATIONS).run_pending()
    }

    /// Ensure the schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, PersistError> {
        self.conn
            .lock()
            .map_err(|e| PersistError::backend(format!("connection lock poisoned: {}", e)))
    }

    fn exists(conn: &Connection, id: AccountId) -> Result<bool, PersistError> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sys_accounts WHERE account_id = ?",
                params![id.get()],
                |row| row.get(0),
            )
            .map_err(PersistError::backend)?;
        Ok(count > 0)
    }
}

impl AccountStore for DuckDbAccountStore {
    fn create(&self, account: &Account) -> Result<(), PersistError> {
        let conn = self.lock()?;

        if Self::exists(&conn, account.id())? {
            return Err(PersistError::Duplicate(account.id()));
        }

        let variant = account.variant();
        conn.execute(
            "INSERT INTO sys_accounts (account_id, name, credential, balance, variant,
                                       overdraft_limit, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                account.id().get(),
                account.name(),
                account.credential().expose(),
                account.balance().to_string(),
                variant.as_str(),
                variant.overdraft_limit().map(|l| l.to_string()),
                account.created_at().to_rfc3339(),
            ],
        )
        .map_err(|e| {
            let msg = e.to_string();
            if msg.to_lowercase().contains("duplicate key") {
                PersistError::Duplicate(account.id())
            } else {
                PersistError::Backend(msg)
            }
        })?;

        Ok(())
    }

    fn fetch(&self, id: AccountId) -> Result<Option<Account>, PersistError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{} WHERE account_id = ?", SELECT_ACCOUNTS))
            .map_err(PersistError::backend)?;

        let rows = stmt
            .query_map(params![id.get()], AccountRow::from_row)
            .map_err(PersistError::backend)?
            .collect::<duckdb::Result<Vec<_>>>()
            .map_err(PersistError::backend)?;

        rows.into_iter().next().map(AccountRow::into_account).transpose()
    }

    fn fetch_all(&self) -> Result<Vec<Account>, PersistError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{} ORDER BY account_id", SELECT_ACCOUNTS))
            .map_err(PersistError::backend)?;

        let rows = stmt
            .query_map([], AccountRow::from_row)
            .map_err(PersistError::backend)?
            .collect::<duckdb::Result<Vec<_>>>()
            .map_err(PersistError::backend)?;

        rows.into_iter().map(AccountRow::into_account).collect()
    }

    fn update_balance(&self, id: AccountId, balance: Decimal) -> Result<(), PersistError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE sys_accounts SET balance = ? WHERE account_id = ?",
                params![balance.to_string(), id.get()],
            )
            .map_err(PersistError::backend)?;

        if changed == 0 {
            return Err(PersistError::Missing(id));
        }
        Ok(())
    }
}
