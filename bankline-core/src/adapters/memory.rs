//! In-memory account store
//!
//! Used by tests and by embedders that want no durable state. Balance
//! writes can be switched to fail so callers can exercise the
//! "committed in memory, not saved" path.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::domain::result::PersistError;
use crate::domain::{Account, AccountId};
use crate::ports::AccountStore;

/// `AccountStore` backed by a map
#[derive(Default)]
pub struct InMemoryAccountStore {
    records: RwLock<BTreeMap<AccountId, Account>>,
    fail_updates: AtomicBool,
    update_calls: AtomicUsize,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `update_balance` fail (or succeed again)
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Number of `update_balance` calls seen, failed ones included
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Stored balance, if the record exists
    pub fn stored_balance(&self, id: AccountId) -> Option<Decimal> {
        self.records.read().get(&id).map(|a| a.balance())
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl AccountStore for InMemoryAccountStore {
    fn create(&self, account: &Account) -> Result<(), PersistError> {
        let mut records = self.records.write();
        if records.contains_key(&account.id()) {
            return Err(PersistError::Duplicate(account.id()));
        }
        records.insert(account.id(), account.clone());
        Ok(())
    }

    fn fetch(&self, id: AccountId) -> Result<Option<Account>, PersistError> {
        Ok(self.records.read().get(&id).cloned())
    }

    fn fetch_all(&self) -> Result<Vec<Account>, PersistError> {
        Ok(self.records.read().values().cloned().collect())
    }

    fn update_balance(&self, id: AccountId, balance: Decimal) -> Result<(), PersistError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(PersistError::backend("simulated write failure"));
        }

        let mut records = self.records.write();
        let current = records.get(&id).ok_or(PersistError::Missing(id))?;
        let updated = Account::restore(
            current.id(),
            current.name().to_string(),
            current.credential().clone(),
            balance,
            current.variant(),
            current.created_at(),
        );
        records.insert(id, updated);
        Ok(())
    }
}
