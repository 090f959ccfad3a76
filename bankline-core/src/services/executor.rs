//! Transaction executor - serialized per-account deposit/withdraw
//!
//! Each call resolves the account's slot, takes its mutation lock only for
//! the check-then-update of the balance, releases it, then flushes to the
//! store. The store write never happens under the mutation lock.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::MutexGuard;
use rust_decimal::Decimal;

use crate::domain::result::{Error, PersistError, Result};
use crate::domain::{Account, AccountId, TransactionKind, TransactionReceipt};
use crate::ports::AccountStore;

use super::ledger::{AccountSlot, Ledger};

/// Runs deposits and withdraws against the ledger
pub struct TransactionExecutor {
    ledger: Arc<Ledger>,
    store: Arc<dyn AccountStore>,
    lock_timeout: Option<Duration>,
}

impl TransactionExecutor {
    /// Executor that waits for account locks indefinitely
    pub fn new(ledger: Arc<Ledger>, store: Arc<dyn AccountStore>) -> Self {
        Self {
            ledger,
            store,
            lock_timeout: None,
        }
    }

    /// Bound the wait for an account lock; `None` blocks until acquired
    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn deposit(&self, account_id: AccountId, amount: Decimal) -> Result<TransactionReceipt> {
        self.execute(account_id, TransactionKind::Deposit, amount)
    }

    pub fn withdraw(&self, account_id: AccountId, amount: Decimal) -> Result<TransactionReceipt> {
        self.execute(account_id, TransactionKind::Withdraw, amount)
    }

    /// Apply one deposit or withdraw and flush the new balance
    ///
    /// On `Error::PersistenceFailure` the mutation has already been applied
    /// and the error carries its receipt; retry with `flush`, never by
    /// executing again. Policy failures report `TransactionState::Rejected`
    /// and contention `TransactionState::LockTimeout` through
    /// `Error::transaction_state`.
    pub fn execute(
        &self,
        account_id: AccountId,
        kind: TransactionKind,
        amount: Decimal,
    ) -> Result<TransactionReceipt> {
        let slot = self.ledger.slot(account_id)?;

        let mut receipt = {
            let mut account = self.acquire(&slot, account_id)?;
            let balance_after = apply(&mut account, kind, amount)?;
            TransactionReceipt::new(account_id, kind, amount, balance_after)
        };

        match self.flush_slot(&slot, account_id) {
            Ok(_) => {
                receipt.mark_flushed();
                Ok(receipt)
            }
            Err(source) => Err(Error::PersistenceFailure {
                account_id,
                source,
                receipt: Some(Box::new(receipt)),
            }),
        }
    }

    /// Write the account's current committed balance to the store
    ///
    /// This is the retry path after `PersistenceFailure`. It always writes
    /// the latest in-memory balance, so repeating it is safe.
    pub fn flush(&self, account_id: AccountId) -> Result<Decimal> {
        let slot = self.ledger.slot(account_id)?;
        self.flush_slot(&slot, account_id)
            .map_err(|source| Error::PersistenceFailure {
                account_id,
                source,
                receipt: None,
            })
    }

    fn acquire<'a>(
        &self,
        slot: &'a AccountSlot,
        account_id: AccountId,
    ) -> Result<MutexGuard<'a, Account>> {
        match self.lock_timeout {
            None => Ok(slot.account.lock()),
            Some(waited) => slot
                .account
                .try_lock_for(waited)
                .ok_or(Error::LockTimeout { account_id, waited }),
        }
    }

    fn flush_slot(
        &self,
        slot: &AccountSlot,
        account_id: AccountId,
    ) -> std::result::Result<Decimal, PersistError> {
        // Flushes of one account are serialized and each reads the balance
        // after taking the flush lock, so the last write is never stale.
        // The balance read is not bounded by the lock timeout: by now the
        // mutation is committed and only the save is left.
        let _flushing = slot.flush.lock();
        let balance = slot.account.lock().balance();

        self.store.update_balance(account_id, balance)?;
        Ok(balance)
    }
}

fn apply(account: &mut Account, kind: TransactionKind, amount: Decimal) -> Result<Decimal> {
    match kind {
        TransactionKind::Deposit => account.deposit(amount),
        TransactionKind::Withdraw => account.withdraw(amount),
    }
}
