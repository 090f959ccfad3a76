//! Demo-threads command - concurrent deposit and withdraw on one account

use anyhow::Result;
use colored::Colorize;

use bankline_core::AccountId;

use super::{authenticate, get_context};
use crate::output;

pub fn run(id: AccountId, password: Option<String>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    authenticate(&ctx, id, password)?;

    let report = ctx.demo_service.run(id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Concurrent transactions".bold());
    println!("Starting balance: {}", output::format_amount(report.starting_balance));
    for outcome in &report.outcomes {
        match (&outcome.balance_after, &outcome.error_kind) {
            (Some(balance), _) => println!(
                "  {} {} {} -> {}",
                outcome.thread.dimmed(),
                outcome.kind,
                outcome.amount,
                output::format_amount(*balance)
            ),
            (None, Some(kind)) => println!(
                "  {} {} {} -> {}",
                outcome.thread.dimmed(),
                outcome.kind,
                outcome.amount,
                kind.red()
            ),
            (None, None) => {}
        }
    }
    output::success(&format!(
        "Final balance: {}",
        output::format_amount(report.final_balance)
    ));
    Ok(())
}
