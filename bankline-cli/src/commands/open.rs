//! Open command - create a new account

use anyhow::Result;
use rust_decimal::Decimal;

use bankline_core::services::NewAccount;
use bankline_core::AccountVariant;

use super::{credential_from_password, get_context, read_password};
use crate::output;

pub struct OpenArgs {
    pub name: String,
    pub initial: Decimal,
    /// `Some(None)` asks for the configured default limit
    pub overdraft: Option<Option<Decimal>>,
    pub password: Option<String>,
    pub json: bool,
}

pub fn run(args: OpenArgs) -> Result<()> {
    let ctx = get_context()?;
    let service = &ctx.account_service;

    let variant = match args.overdraft {
        Some(limit) => service.overdraft_variant(limit)?,
        None => AccountVariant::Standard,
    };

    let password = read_password(args.password, true)?;
    let account = service.create_account(NewAccount {
        name: args.name,
        credential: credential_from_password(&password),
        initial_balance: args.initial,
        variant,
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&account)?);
        return Ok(());
    }

    output::success(&format!("Opened account {}", account.id()));
    println!("  Name:    {}", account.name());
    println!("  Type:    {}", account.variant());
    println!("  Balance: {}", output::format_amount(account.balance()));
    Ok(())
}
