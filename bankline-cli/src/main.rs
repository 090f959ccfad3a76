//! Bankline CLI - account ledger in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

mod commands;
mod output;

use bankline_core::{AccountId, TransactionKind};
use commands::{account, config, demo, list, login, logs, open};

/// Bankline - account ledger in your terminal
#[derive(Parser)]
#[command(name = "bk", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a new account
    Open {
        /// Account holder name
        #[arg(long)]
        name: String,
        /// Opening balance
        #[arg(long, default_value = "0")]
        initial: Decimal,
        /// Allow overdraft, optionally with a limit (default from settings)
        #[arg(long, num_args = 0..=1)]
        overdraft: Option<Option<Decimal>>,
        /// Password (prompted if omitted)
        #[arg(short, long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check an account's password
    Login {
        /// Account ID
        #[arg(long)]
        id: AccountId,
        /// Password (prompted if omitted)
        #[arg(short, long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show an account's balance
    Balance {
        /// Account ID
        #[arg(long)]
        id: AccountId,
        /// Password (prompted if omitted)
        #[arg(short, long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Deposit into an account
    Deposit {
        /// Account ID
        #[arg(long)]
        id: AccountId,
        /// Amount to deposit
        #[arg(long)]
        amount: Decimal,
        /// Password (prompted if omitted)
        #[arg(short, long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Withdraw from an account
    Withdraw {
        /// Account ID
        #[arg(long)]
        id: AccountId,
        /// Amount to withdraw
        #[arg(long)]
        amount: Decimal,
        /// Password (prompted if omitted)
        #[arg(short, long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write an account's balance to the database again
    Flush {
        /// Account ID
        #[arg(long)]
        id: AccountId,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List accounts and totals
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a deposit and a withdraw concurrently on one account
    DemoThreads {
        /// Account ID
        #[arg(long)]
        id: AccountId,
        /// Password (prompted if omitted)
        #[arg(short, long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },

    /// Show or change ledger settings
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },
}

impl Commands {
    /// Name recorded in the event log
    fn name(&self) -> &'static str {
        match self {
            Commands::Open { .. } => "open",
            Commands::Login { .. } => "login",
            Commands::Balance { .. } => "balance",
            Commands::Deposit { .. } => "deposit",
            Commands::Withdraw { .. } => "withdraw",
            Commands::Flush { .. } => "flush",
            Commands::List { .. } => "list",
            Commands::DemoThreads { .. } => "demo-threads",
            Commands::Logs { .. } => "logs",
            Commands::Config { .. } => "config",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.name();

    let result = run(cli);

    if command != "logs" {
        let logger = commands::get_logger();
        commands::log_outcome(&logger, command, &result);
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Open { name, initial, overdraft, password, json } => open::run(open::OpenArgs {
            name,
            initial,
            overdraft,
            password,
            json,
        }),
        Commands::Login { id, password, json } => login::run(id, password, json),
        Commands::Balance { id, password, json } => account::balance(id, password, json),
        Commands::Deposit { id, amount, password, json } => {
            account::transact(id, TransactionKind::Deposit, amount, password, json)
        }
        Commands::Withdraw { id, amount, password, json } => {
            account::transact(id, TransactionKind::Withdraw, amount, password, json)
        }
        Commands::Flush { id, json } => account::flush(id, json),
        Commands::List { json } => list::run(json),
        Commands::DemoThreads { id, password, json } => demo::run(id, password, json),
        Commands::Logs { command } => logs::run(command),
        Commands::Config { command } => config::run(command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_overdraft_flag_with_and_without_limit() {
        let cli = Cli::try_parse_from(["bk", "open", "--name", "Bob", "--overdraft"]).unwrap();
        match cli.command {
            Commands::Open { overdraft, initial, .. } => {
                assert_eq!(overdraft, Some(None));
                assert_eq!(initial, Decimal::ZERO);
            }
            _ => panic!("expected open"),
        }

        let cli = Cli::try_parse_from([
            "bk", "open", "--name", "Bob", "--overdraft", "250", "--initial", "10.50",
        ])
        .unwrap();
        match cli.command {
            Commands::Open { overdraft, initial, .. } => {
                assert_eq!(overdraft, Some(Some(Decimal::from(250))));
                assert_eq!(initial, Decimal::new(1050, 2));
            }
            _ => panic!("expected open"),
        }
    }

    #[test]
    fn test_account_id_is_parsed() {
        let cli = Cli::try_parse_from(["bk", "withdraw", "--id", "1001", "--amount", "150"]).unwrap();
        assert_eq!(cli.command.name(), "withdraw");
        assert!(Cli::try_parse_from(["bk", "withdraw", "--id", "abc", "--amount", "1"]).is_err());
    }

    #[test]
    fn test_config_and_export_subcommands_parse() {
        let cli = Cli::try_parse_from([
            "bk", "config", "set", "--lock-timeout-ms", "0", "--default-overdraft-limit", "500",
        ])
        .unwrap();
        assert_eq!(cli.command.name(), "config");

        let cli = Cli::try_parse_from(["bk", "logs", "export", "--output", "out.duckdb"]).unwrap();
        assert_eq!(cli.command.name(), "logs");
    }
}
