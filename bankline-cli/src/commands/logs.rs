//! Logs command - view and manage the event log

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::Subcommand;
use colored::Colorize;

use super::get_bankline_dir;
use crate::output;
use bankline_core::{EntryPoint, LoggingService};

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent log entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only errors
        #[arg(long)]
        errors: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear old log entries
    Clear {
        /// Delete logs older than N days (0 deletes everything)
        #[arg(long, default_value = "30")]
        older_than_days: u64,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show log statistics and database path
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Copy the log database to a file
    Export {
        /// Destination path
        #[arg(short, long)]
        output: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn get_logging_service() -> Result<LoggingService> {
    let bankline_dir = get_bankline_dir()?;
    std::fs::create_dir_all(&bankline_dir)?;
    LoggingService::new(&bankline_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
}

fn format_timestamp(timestamp_ms: i64) -> String {
    use chrono::{TimeZone, Utc};
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

pub fn run(command: LogsCommands) -> Result<()> {
    match command {
        LogsCommands::List { limit, errors, json } => {
            let service = get_logging_service()?;
            let entries = if errors {
                service.get_errors(limit)?
            } else {
                service.get_recent(limit)?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }

            if entries.is_empty() {
                println!("No log entries found.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Time", "Entry", "Event", "Command", "Outcome"]);

            for entry in entries {
                let outcome = match (entry.outcome, entry.error_message.is_some()) {
                    (Some(outcome), true) => outcome.red().to_string(),
                    (Some(outcome), false) => outcome,
                    (None, true) => "!".red().to_string(),
                    (None, false) => String::new(),
                };

                table.add_row(vec![
                    format_timestamp(entry.timestamp),
                    entry.entry_point,
                    entry.event,
                    entry.command.unwrap_or_default(),
                    outcome,
                ]);
            }

            println!("{}", table);
        }
        LogsCommands::Clear {
            older_than_days,
            force,
            json,
        } => {
            let service = get_logging_service()?;

            if !force && !json {
                use dialoguer::Confirm;
                let prompt = if older_than_days == 0 {
                    "Delete all logs?".to_string()
                } else {
                    format!("Delete logs older than {} days?", older_than_days)
                };
                if !Confirm::new().with_prompt(prompt).default(false).interact()? {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let deleted = if older_than_days == 0 {
                service.clear()?
            } else {
                let now_ms = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map_err(|e| anyhow!("System clock before unix epoch: {}", e))?
                    .as_millis() as i64;
                service.delete_before(now_ms - (older_than_days as i64 * 24 * 60 * 60 * 1000))?
            };

            if json {
                println!("{}", serde_json::json!({"deleted": deleted}));
            } else {
                println!("Deleted {} log entries", deleted);
            }
        }
        LogsCommands::Stats { json } => {
            let service = get_logging_service()?;
            let total = service.count()?;
            let errors = service.get_errors(1000)?.len();
            let db_path = service.db_path().to_path_buf();
            let size_bytes = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "total_entries": total,
                        "error_count": errors,
                        "database_path": db_path.to_string_lossy(),
                        "database_size_bytes": size_bytes
                    })
                );
            } else {
                println!("{}", "Log Statistics".bold());
                println!("  Total entries: {}", total);
                println!("  Errors: {}", errors);
                println!("  Database: {}", db_path.display());
                println!("  Size: {}", output::format_size(size_bytes));
            }
        }
        LogsCommands::Export { output: path, json } => {
            let service = get_logging_service()?;
            if path.as_path() == service.db_path() {
                bail!("Export path is the live log database");
            }
            let written = service.export(&path)?;
            let size_bytes = std::fs::metadata(&written).map(|m| m.len()).unwrap_or(0);

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "path": written.to_string_lossy(),
                        "size_bytes": size_bytes
                    })
                );
            } else {
                output::success(&format!(
                    "Exported logs to {} ({})",
                    written.display(),
                    output::format_size(size_bytes)
                ));
            }
        }
    }

    Ok(())
}
