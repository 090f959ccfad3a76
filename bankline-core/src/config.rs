//! Configuration management
//!
//! Settings live in `settings.json` inside the bankline directory:
//! ```json
//! {
//!   "ledger": { "lockTimeoutMs": 250, "defaultOverdraftLimit": "1000", "firstAccountId": 1000 }
//! }
//! ```
//! Keys this crate does not manage are preserved when saving.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Default bounded wait for an account lock
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 250;

/// Environment override for the lock timeout (`0` blocks forever)
pub const LOCK_TIMEOUT_ENV: &str = "BANKLINE_LOCK_TIMEOUT_MS";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    ledger: LedgerSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lock_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_overdraft_limit: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    first_account_id: Option<i64>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Bankline configuration (simplified view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    /// Bounded wait for an account lock; `None` blocks indefinitely
    pub lock_timeout: Option<Duration>,
    /// Limit given to overdraft accounts opened without an explicit one
    pub default_overdraft_limit: Decimal,
    /// Ids are assigned above this floor
    pub first_account_id: i64,
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_timeout: Some(Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS)),
            default_overdraft_limit: Decimal::from(1000),
            first_account_id: 1000,
            _raw_settings: SettingsFile::default(),
        }
    }
}

fn timeout_from_ms(ms: u64) -> Option<Duration> {
    if ms == 0 {
        None
    } else {
        Some(Duration::from_millis(ms))
    }
}

impl Config {
    /// Load config from the bankline directory
    ///
    /// A missing file gives defaults; a malformed one is an error.
    /// `BANKLINE_LOCK_TIMEOUT_MS` overrides the file's lock timeout.
    pub fn load(bankline_dir: &Path) -> Result<Self> {
        let settings_path = bankline_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid settings file: {:?}", settings_path))?
        } else {
            SettingsFile::default()
        };

        let defaults = Config::default();

        let lock_timeout_ms = match std::env::var(LOCK_TIMEOUT_ENV) {
            Ok(value) => Some(
                value
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("{} must be a number of milliseconds", LOCK_TIMEOUT_ENV))?,
            ),
            Err(_) => raw.ledger.lock_timeout_ms,
        };
        let lock_timeout = match lock_timeout_ms {
            Some(ms) => timeout_from_ms(ms),
            None => defaults.lock_timeout,
        };

        let config = Self {
            lock_timeout,
            default_overdraft_limit: raw
                .ledger
                .default_overdraft_limit
                .unwrap_or(defaults.default_overdraft_limit),
            first_account_id: raw.ledger.first_account_id.unwrap_or(defaults.first_account_id),
            _raw_settings: raw,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the ledger cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.default_overdraft_limit <= Decimal::ZERO {
            anyhow::bail!(
                "defaultOverdraftLimit must be positive, got {}",
                self.default_overdraft_limit
            );
        }
        if self.first_account_id < 0 {
            anyhow::bail!(
                "firstAccountId cannot be negative, got {}",
                self.first_account_id
            );
        }
        Ok(())
    }

    /// Save config to the bankline directory, keeping unmanaged keys
    pub fn save(&self, bankline_dir: &Path) -> Result<()> {
        self.validate()?;
        let settings_path = bankline_dir.join("settings.json");

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_else(|_| self._raw_settings.clone())
        } else {
            self._raw_settings.clone()
        };

        settings.ledger.lock_timeout_ms =
            Some(self.lock_timeout.map(|d| d.as_millis() as u64).unwrap_or(0));
        settings.ledger.default_overdraft_limit = Some(self.default_overdraft_limit);
        settings.ledger.first_account_id = Some(self.first_account_id);

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.default_overdraft_limit, Decimal::from(1000));
        assert_eq!(config.first_account_id, 1000);
    }

    #[test]
    fn test_save_preserves_unmanaged_keys() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"theme": "dark", "ledger": {"defaultOverdraftLimit": "250", "note": "keep"}}"#,
        )
        .unwrap();

        let mut config = Config::load(dir.path()).unwrap();
        assert_eq!(config.default_overdraft_limit, Decimal::from(250));

        config.first_account_id = 5000;
        config.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("settings.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["theme"], "dark");
        assert_eq!(value["ledger"]["note"], "keep");
        assert_eq!(value["ledger"]["firstAccountId"], 5000);

        let reloaded = Config::load(dir.path()).unwrap();
        assert_eq!(reloaded.first_account_id, 5000);
        assert_eq!(reloaded.default_overdraft_limit, Decimal::from(250));
    }

    #[test]
    fn test_save_refuses_invalid_values() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.default_overdraft_limit = Decimal::ZERO;
        assert!(config.save(dir.path()).is_err());
        assert!(!dir.path().join("settings.json").exists());

        config.default_overdraft_limit = Decimal::from(10);
        config.first_account_id = -1;
        assert!(config.save(dir.path()).is_err());
    }

    #[test]
    fn test_non_positive_overdraft_limit_is_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"ledger": {"defaultOverdraftLimit": "0"}}"#,
        )
        .unwrap();
        assert!(Config::load(dir.path()).is_err());
    }
}
