//! Balance, deposit, withdraw and flush commands

use std::thread;
use std::time::Duration;

use anyhow::Result;
use rust_decimal::Decimal;

use bankline_core::{AccountId, BanklineContext, Error, TransactionKind, TransactionReceipt};

use super::{authenticate, get_context};
use crate::output;

/// Flush attempts made before giving up on a committed transaction
const FLUSH_RETRIES: u32 = 3;
const FLUSH_RETRY_DELAY_MS: u64 = 100;

pub fn balance(id: AccountId, password: Option<String>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    authenticate(&ctx, id, password)?;
    let balance = ctx.account_service.get_balance(id)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "account_id": id, "balance": balance })
        );
    } else {
        println!("Balance: {}", output::format_amount(balance));
    }
    Ok(())
}

pub fn transact(
    id: AccountId,
    kind: TransactionKind,
    amount: Decimal,
    password: Option<String>,
    json: bool,
) -> Result<()> {
    let ctx = get_context()?;
    authenticate(&ctx, id, password)?;

    let receipt = match ctx.account_service.execute(id, kind, amount) {
        Ok(receipt) => receipt,
        Err(e) if e.is_retryable_flush() => {
            output::warning("Balance changed but not yet saved, retrying...");
            finish_unsaved(e, || retry_flush(&ctx, id))?
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&receipt)?);
        return Ok(());
    }

    output::success(&format!("{} of {} completed", kind, amount));
    println!("New balance: {}", output::format_amount(receipt.balance_after));
    Ok(())
}

/// Flush a transaction that committed in memory only, keeping its receipt
fn finish_unsaved(
    error: Error,
    flush: impl FnOnce() -> Result<Decimal>,
) -> Result<TransactionReceipt> {
    match error {
        Error::PersistenceFailure {
            receipt: Some(receipt),
            ..
        } => {
            flush()?;
            let mut receipt = *receipt;
            receipt.mark_flushed();
            Ok(receipt)
        }
        other => Err(other.into()),
    }
}

/// Re-write an account's balance to the store
pub fn flush(id: AccountId, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let balance = retry_flush(&ctx, id)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "account_id": id, "balance": balance, "flushed": true })
        );
    } else {
        output::success(&format!("Saved balance {} for account {}", balance, id));
    }
    Ok(())
}

fn retry_flush(ctx: &BanklineContext, id: AccountId) -> Result<Decimal> {
    let mut attempt = 0;
    loop {
        match ctx.account_service.retry_flush(id) {
            Ok(balance) => return Ok(balance),
            Err(e) if e.is_retryable_flush() && attempt + 1 < FLUSH_RETRIES => {
                let delay = Duration::from_millis(FLUSH_RETRY_DELAY_MS * 2u64.pow(attempt));
                eprintln!(
                    "[bankline] Flush failed, retrying in {}ms (attempt {}/{})",
                    delay.as_millis(),
                    attempt + 1,
                    FLUSH_RETRIES
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use bankline_core::{PersistError, TransactionState};

    fn unsaved(receipt: &TransactionReceipt) -> Error {
        Error::PersistenceFailure {
            account_id: receipt.account_id,
            source: PersistError::backend("disk full"),
            receipt: Some(Box::new(receipt.clone())),
        }
    }

    fn committed() -> TransactionReceipt {
        TransactionReceipt::new(
            AccountId::new(1001),
            TransactionKind::Deposit,
            Decimal::from(200),
            Decimal::from(1200),
        )
    }

    #[test]
    fn test_finish_unsaved_reports_original_receipt() {
        let original = committed();
        // A later transaction moved the balance before the retry landed
        let finished = finish_unsaved(unsaved(&original), || Ok(Decimal::from(1050))).unwrap();

        assert_eq!(finished.id, original.id);
        assert_eq!(finished.executed_at, original.executed_at);
        assert_eq!(finished.balance_after, Decimal::from(1200));
        assert_eq!(finished.state, TransactionState::Flushed);
    }

    #[test]
    fn test_finish_unsaved_propagates_flush_failure() {
        let err = finish_unsaved(unsaved(&committed()), || Err(anyhow!("still down"))).unwrap_err();
        assert!(err.to_string().contains("still down"));

        let not_found = finish_unsaved(Error::AccountNotFound(AccountId::new(9)), || {
            panic!("no flush for errors without a receipt")
        })
        .unwrap_err();
        assert!(not_found.downcast_ref::<Error>().is_some());
    }
}
