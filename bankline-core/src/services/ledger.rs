//! Ledger - the in-memory, authoritative account table
//!
//! Accounts live in an arena of slots indexed by id. Each slot owns the
//! account's exclusive mutation lock and a separate flush lock, so the
//! table itself only needs a coarse `RwLock` for insert and lookup. The
//! table lock is always released before an account lock is taken.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::domain::result::{Error, Result};
use crate::domain::{Account, AccountId};

/// One account's entry in the ledger
pub(crate) struct AccountSlot {
    /// Exclusive mutation lock; guards every read-modify-write of the balance
    pub(crate) account: Mutex<Account>,
    /// Serializes store writes for this account without blocking mutations
    pub(crate) flush: Mutex<()>,
}

impl AccountSlot {
    fn new(account: Account) -> Self {
        Self {
            account: Mutex::new(account),
            flush: Mutex::new(()),
        }
    }
}

#[derive(Default)]
struct Table {
    index: HashMap<AccountId, usize>,
    slots: Vec<Arc<AccountSlot>>,
}

/// In-memory mapping from account id to account
///
/// `get` never falls back to the store. The only ways in are `put` (a
/// creation event), `insert_if_absent` (an explicit load) and `seed`
/// (startup). Loads never replace an entry that is already present.
#[derive(Default)]
pub struct Ledger {
    table: RwLock<Table>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `account.id()`
    ///
    /// Last writer wins. Replacing keeps the existing slot, so an id never
    /// has more than one lock.
    pub fn put(&self, account: Account) {
        let existing = {
            let mut table = self.table.write();
            let found = table.index.get(&account.id()).copied();
            match found {
                Some(pos) => Arc::clone(&table.slots[pos]),
                None => {
                    let pos = table.slots.len();
                    table.index.insert(account.id(), pos);
                    table.slots.push(Arc::new(AccountSlot::new(account)));
                    return;
                }
            }
        };
        *existing.account.lock() = account;
    }

    /// Add `account` unless its id is already held; true when added
    pub fn insert_if_absent(&self, account: Account) -> bool {
        let mut table = self.table.write();
        if table.index.contains_key(&account.id()) {
            return false;
        }
        let pos = table.slots.len();
        table.index.insert(account.id(), pos);
        table.slots.push(Arc::new(AccountSlot::new(account)));
        true
    }

    /// Bulk population path used at startup; returns how many were added
    pub fn seed(&self, accounts: impl IntoIterator<Item = Account>) -> usize {
        accounts
            .into_iter()
            .map(|account| self.insert_if_absent(account))
            .filter(|added| *added)
            .count()
    }

    /// Snapshot of one account
    pub fn get(&self, id: AccountId) -> Result<Account> {
        let slot = self.slot(id)?;
        let account = slot.account.lock().clone();
        Ok(account)
    }

    /// Snapshot of every account, in insertion order
    pub fn all_accounts(&self) -> Vec<Account> {
        let slots: Vec<Arc<AccountSlot>> = self.table.read().slots.to_vec();
        slots.iter().map(|slot| slot.account.lock().clone()).collect()
    }

    pub fn contains(&self, id: AccountId) -> bool {
        self.table.read().index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.table.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Largest id currently held, if any
    pub fn max_id(&self) -> Option<AccountId> {
        self.table.read().index.keys().copied().max()
    }

    /// Shared handle to an account's slot; the table lock is released on return
    pub(crate) fn slot(&self, id: AccountId) -> Result<Arc<AccountSlot>> {
        let table = self.table.read();
        table
            .index
            .get(&id)
            .map(|&pos| Arc::clone(&table.slots[pos]))
            .ok_or(Error::AccountNotFound(id))
    }
}
