//! List command - show every account and ledger totals

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use bankline_core::services::LedgerSummary;
use bankline_core::Account;

use super::get_context;
use crate::output;

#[derive(Serialize)]
struct ListOutput {
    accounts: Vec<Account>,
    summary: LedgerSummary,
}

fn account_row(account: &Account) -> Vec<String> {
    vec![
        account.id().to_string(),
        account.name().to_string(),
        account.variant().to_string(),
        output::format_amount(account.balance()),
        output::format_amount(account.available_to_withdraw()),
    ]
}

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let accounts = ctx.account_service.list_accounts();
    let summary = ctx.account_service.summary();

    if json {
        let out = ListOutput { accounts, summary };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if accounts.is_empty() {
        output::info("No accounts yet. Create one with `bk open`.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["ID", "Name", "Type", "Balance", "Available"]);
    for account in &accounts {
        table.add_row(account_row(account));
    }
    println!("{}", table);
    println!();

    println!("{}", "Totals".bold());
    println!("  Accounts:  {}", summary.total_accounts);
    println!("  Balance:   {}", output::format_amount(summary.total_balance));
    if summary.overdrawn_accounts > 0 {
        output::warning(&format!("  Overdrawn: {}", summary.overdrawn_accounts));
    }
    Ok(())
}
