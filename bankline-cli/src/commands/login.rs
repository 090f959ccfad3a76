//! Login command - check an account's password

use anyhow::Result;
use bankline_core::AccountId;

use super::{authenticate, get_context};
use crate::output;

pub fn run(id: AccountId, password: Option<String>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let account = authenticate(&ctx, id, password)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&account)?);
        return Ok(());
    }

    output::success(&format!("Welcome, {}", account.name()));
    println!("  Account: {} ({})", account.id(), account.variant());
    println!("  Balance: {}", output::format_amount(account.balance()));
    Ok(())
}
