//! Config command - show and change ledger settings

use std::time::Duration;

use anyhow::{bail, Result};
use clap::Subcommand;
use colored::Colorize;
use rust_decimal::Decimal;

use super::get_bankline_dir;
use bankline_core::config::{Config, LOCK_TIMEOUT_ENV};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change settings in settings.json
    Set {
        /// Lock wait in milliseconds (0 waits forever)
        #[arg(long)]
        lock_timeout_ms: Option<u64>,
        /// Limit for overdraft accounts opened without one
        #[arg(long)]
        default_overdraft_limit: Option<Decimal>,
        /// New ids are assigned above this value
        #[arg(long)]
        first_account_id: Option<i64>,
    },
}

fn timeout_ms(timeout: Option<Duration>) -> u64 {
    timeout.map(|d| d.as_millis() as u64).unwrap_or(0)
}

pub fn run(command: ConfigCommands) -> Result<()> {
    let bankline_dir = get_bankline_dir()?;

    match command {
        ConfigCommands::Show { json } => {
            let config = Config::load(&bankline_dir)?;

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "lockTimeoutMs": timeout_ms(config.lock_timeout),
                        "defaultOverdraftLimit": config.default_overdraft_limit,
                        "firstAccountId": config.first_account_id,
                    })
                );
                return Ok(());
            }

            println!("{}", "Ledger settings".bold());
            match config.lock_timeout {
                Some(timeout) => println!("  Lock timeout: {} ms", timeout.as_millis()),
                None => println!("  Lock timeout: none (waits forever)"),
            }
            println!("  Default overdraft limit: {}", config.default_overdraft_limit);
            println!("  First account id: {}", config.first_account_id);
            if std::env::var(LOCK_TIMEOUT_ENV).is_ok() {
                println!("  {}", format!("Lock timeout set by {}", LOCK_TIMEOUT_ENV).dimmed());
            }
        }
        ConfigCommands::Set {
            lock_timeout_ms,
            default_overdraft_limit,
            first_account_id,
        } => {
            if lock_timeout_ms.is_none()
                && default_overdraft_limit.is_none()
                && first_account_id.is_none()
            {
                bail!("Nothing to set; pass at least one setting");
            }
            if std::env::var(LOCK_TIMEOUT_ENV).is_ok() {
                bail!("Unset {} before changing settings", LOCK_TIMEOUT_ENV);
            }

            std::fs::create_dir_all(&bankline_dir)?;
            let mut config = Config::load(&bankline_dir)?;
            if let Some(ms) = lock_timeout_ms {
                config.lock_timeout = (ms > 0).then(|| Duration::from_millis(ms));
            }
            if let Some(limit) = default_overdraft_limit {
                config.default_overdraft_limit = limit;
            }
            if let Some(id) = first_account_id {
                config.first_account_id = id;
            }
            config.save(&bankline_dir)?;

            println!("{}", "Settings saved".green());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_ms_maps_none_to_zero() {
        assert_eq!(timeout_ms(None), 0);
        assert_eq!(timeout_ms(Some(Duration::from_millis(250))), 250);
    }
}
