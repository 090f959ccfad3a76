//! CLI command implementations

pub mod account;
pub mod config;
pub mod demo;
pub mod list;
pub mod login;
pub mod logs;
pub mod open;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use dialoguer::Password;
use sha2::{Digest, Sha256};

use bankline_core::{
    Account, AccountId, BanklineContext, Credential, EntryPoint, LogEvent, LoggingService,
};

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let bankline_dir = get_bankline_dir().ok()?;
    std::fs::create_dir_all(&bankline_dir).ok()?;
    LoggingService::new(&bankline_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Record how a command ended; ledger errors are logged by kind only
pub fn log_outcome(logger: &Option<LoggingService>, command: &str, result: &Result<()>) {
    let event = match result {
        Ok(()) => LogEvent::new("command_executed")
            .with_command(command)
            .with_outcome("ok"),
        Err(e) => {
            let failed = LogEvent::new("command_failed").with_command(command);
            match e.downcast_ref::<bankline_core::Error>() {
                Some(ledger_error) => failed.with_ledger_error(ledger_error),
                None => failed.with_outcome("error").with_error("cli_error"),
            }
        }
    };
    log_event(logger, event);
}

/// Get the bankline directory from environment or default
pub fn get_bankline_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("BANKLINE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".bankline"))
        .ok_or_else(|| anyhow!("Could not find home directory; set BANKLINE_DIR"))
}

/// Open the ledger database and load every account
pub fn get_context() -> Result<BanklineContext> {
    let bankline_dir = get_bankline_dir()?;

    std::fs::create_dir_all(&bankline_dir)
        .with_context(|| format!("Failed to create bankline directory: {:?}", bankline_dir))?;

    BanklineContext::new(&bankline_dir).context("Failed to initialize bankline context")
}

/// Derive the stored credential token from a password
///
/// The core only ever sees this token, never the password.
pub fn credential_from_password(password: &str) -> Credential {
    let digest = Sha256::digest(password.as_bytes());
    Credential::new(hex::encode(digest))
}

/// Use the given password or prompt for one without echo
pub fn read_password(password: Option<String>, confirm: bool) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    let prompt = Password::new().with_prompt("Password");
    let password = if confirm {
        prompt
            .with_confirmation("Confirm password", "Passwords do not match")
            .interact()?
    } else {
        prompt.interact()?
    };
    Ok(password)
}

/// Authenticate against the loaded ledger
pub fn authenticate(
    ctx: &BanklineContext,
    id: AccountId,
    password: Option<String>,
) -> Result<Account> {
    let password = read_password(password, false)?;
    let account = ctx
        .account_service
        .authenticate(id, &credential_from_password(&password))?;
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_is_sha256_hex() {
        let credential = credential_from_password("test");
        assert_eq!(
            credential.expose(),
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
        assert!(credential.matches(&credential_from_password("test")));
        assert!(!credential.matches(&credential_from_password("Test")));
    }
}
