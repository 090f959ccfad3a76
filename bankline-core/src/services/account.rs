//! Account service - the surface front ends call
//!
//! Create, authenticate, transact, list and read balances. Cache population
//! is explicit here: `load_all` at startup and `load_account` for a single
//! id. Nothing on the transaction path reads from the store.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::result::{Error, PersistError, Result};
use crate::domain::{
    Account, AccountId, AccountVariant, Credential, TransactionKind, TransactionReceipt,
};
use crate::ports::AccountStore;

use super::executor::TransactionExecutor;
use super::ledger::Ledger;

/// Attempts at picking a free id when the store already has the candidate
const MAX_CREATE_ATTEMPTS: usize = 5;

/// Sequential id source, never handing out an id it has seen
struct IdAllocator {
    next: AtomicI64,
}

impl IdAllocator {
    fn new(floor: i64) -> Self {
        Self {
            next: AtomicI64::new(floor.saturating_add(1)),
        }
    }

    fn observe(&self, id: AccountId) {
        self.next.fetch_max(id.get().saturating_add(1), Ordering::SeqCst);
    }

    /// Stays at `i64::MAX` once reached; the store then reports it taken
    fn next(&self) -> AccountId {
        let id = self
            .next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_add(1)))
            .unwrap_or_else(|n| n);
        AccountId::new(id)
    }
}

/// Account creation request
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub credential: Credential,
    pub initial_balance: Decimal,
    pub variant: AccountVariant,
}

/// Totals across the ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub total_accounts: usize,
    pub total_balance: Decimal,
    pub overdrawn_accounts: usize,
}

pub struct AccountService {
    ledger: Arc<Ledger>,
    store: Arc<dyn AccountStore>,
    executor: Arc<TransactionExecutor>,
    ids: IdAllocator,
    default_overdraft_limit: Decimal,
}

impl AccountService {
    pub fn new(
        ledger: Arc<Ledger>,
        store: Arc<dyn AccountStore>,
        executor: Arc<TransactionExecutor>,
        first_account_id: i64,
        default_overdraft_limit: Decimal,
    ) -> Self {
        let ids = IdAllocator::new(first_account_id);
        if let Some(max) = ledger.max_id() {
            ids.observe(max);
        }
        Self {
            ledger,
            store,
            executor,
            ids,
            default_overdraft_limit,
        }
    }

    /// Seed the ledger from every stored account
    pub fn load_all(&self) -> Result<usize> {
        let accounts = self.store.fetch_all()?;
        for account in &accounts {
            self.ids.observe(account.id());
        }
        Ok(self.ledger.seed(accounts))
    }

    /// Pull one account from the store into the ledger
    ///
    /// An id the ledger already holds is returned from memory; the stored
    /// row may lag behind an unflushed balance and never replaces it.
    pub fn load_account(&self, id: AccountId) -> Result<Account> {
        if let Ok(account) = self.ledger.get(id) {
            return Ok(account);
        }
        let account = self.store.fetch(id)?.ok_or(Error::AccountNotFound(id))?;
        self.ids.observe(id);
        self.ledger.insert_if_absent(account);
        self.ledger.get(id)
    }

    /// Overdraft variant with `limit`, or the configured default
    pub fn overdraft_variant(&self, limit: Option<Decimal>) -> Result<AccountVariant> {
        AccountVariant::overdraft(limit.unwrap_or(self.default_overdraft_limit))
    }

    /// Open an account, save it, then make it visible in the ledger
    pub fn create_account(&self, request: NewAccount) -> Result<Account> {
        let mut last_error = None;

        for _ in 0..MAX_CREATE_ATTEMPTS {
            let id = self.ids.next();
            let account = Account::open(
                id,
                request.name.clone(),
                request.credential.clone(),
                request.initial_balance,
                request.variant,
            )?;

            match self.store.create(&account) {
                Ok(()) => {
                    self.ledger.put(account.clone());
                    return Ok(account);
                }
                // Another process took this id; move past it
                Err(PersistError::Duplicate(taken)) => {
                    self.ids.observe(taken);
                    last_error = Some(PersistError::Duplicate(taken));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_error
            .map(Error::from)
            .unwrap_or_else(|| Error::validation("could not allocate an account id")))
    }

    /// Check a credential; returns the account on success
    pub fn authenticate(&self, id: AccountId, credential: &Credential) -> Result<Account> {
        let account = self.ledger.get(id)?;
        if !account.check_credential(credential) {
            return Err(Error::AuthenticationFailed(id));
        }
        Ok(account)
    }

    pub fn execute(
        &self,
        id: AccountId,
        kind: TransactionKind,
        amount: Decimal,
    ) -> Result<TransactionReceipt> {
        self.executor.execute(id, kind, amount)
    }

    pub fn deposit(&self, id: AccountId, amount: Decimal) -> Result<TransactionReceipt> {
        self.executor.deposit(id, amount)
    }

    pub fn withdraw(&self, id: AccountId, amount: Decimal) -> Result<TransactionReceipt> {
        self.executor.withdraw(id, amount)
    }

    /// Re-send the current balance after a `PersistenceFailure`
    pub fn retry_flush(&self, id: AccountId) -> Result<Decimal> {
        self.executor.flush(id)
    }

    pub fn get_balance(&self, id: AccountId) -> Result<Decimal> {
        Ok(self.ledger.get(id)?.balance())
    }

    pub fn list_accounts(&self) -> Vec<Account> {
        self.ledger.all_accounts()
    }

    pub fn summary(&self) -> LedgerSummary {
        let accounts = self.ledger.all_accounts();
        LedgerSummary {
            total_accounts: accounts.len(),
            total_balance: accounts.iter().map(|a| a.balance()).sum(),
            overdrawn_accounts: accounts
                .iter()
                .filter(|a| a.balance() < Decimal::ZERO)
                .count(),
        }
    }

    pub fn executor(&self) -> &Arc<TransactionExecutor> {
        &self.executor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryAccountStore;

    fn service_with(store: Arc<InMemoryAccountStore>) -> AccountService {
        let ledger = Arc::new(Ledger::new());
        let executor = Arc::new(TransactionExecutor::new(Arc::clone(&ledger), store.clone()));
        AccountService::new(ledger, store, executor, 1000, Decimal::from(1000))
    }

    fn request(name: &str, balance: i64) -> NewAccount {
        NewAccount {
            name: name.to_string(),
            credential: Credential::new(format!("{}-token", name)),
            initial_balance: Decimal::from(balance),
            variant: AccountVariant::Standard,
        }
    }

    #[test]
    fn test_first_account_gets_1001() {
        let service = service_with(Arc::new(InMemoryAccountStore::new()));
        let first = service.create_account(request("alice", 1000)).unwrap();
        let second = service.create_account(request("bob", 0)).unwrap();
        assert_eq!(first.id(), AccountId::new(1001));
        assert_eq!(second.id(), AccountId::new(1002));
        assert_eq!(service.get_balance(first.id()).unwrap(), Decimal::from(1000));
    }

    #[test]
    fn test_create_rejects_negative_initial_balance() {
        let store = Arc::new(InMemoryAccountStore::new());
        let service = service_with(store.clone());
        assert!(matches!(
            service.create_account(request("alice", -1)),
            Err(Error::Validation(_))
        ));
        assert!(store.is_empty());
        assert!(service.list_accounts().is_empty());
    }

    #[test]
    fn test_create_skips_ids_taken_in_store() {
        let store = Arc::new(InMemoryAccountStore::new());
        let squatter = Account::open(
            AccountId::new(1001),
            "other process",
            Credential::new("x"),
            Decimal::ZERO,
            AccountVariant::Standard,
        )
        .unwrap();
        store.create(&squatter).unwrap();

        let service = service_with(store);
        let created = service.create_account(request("alice", 5)).unwrap();
        assert_eq!(created.id(), AccountId::new(1002));
    }

    #[test]
    fn test_authenticate() {
        let service = service_with(Arc::new(InMemoryAccountStore::new()));
        let account = service.create_account(request("alice", 0)).unwrap();

        assert!(service
            .authenticate(account.id(), &Credential::new("alice-token"))
            .is_ok());
        assert!(matches!(
            service.authenticate(account.id(), &Credential::new("ALICE-token")),
            Err(Error::AuthenticationFailed(_))
        ));
        assert!(matches!(
            service.authenticate(AccountId::new(1), &Credential::new("alice-token")),
            Err(Error::AccountNotFound(_))
        ));
    }

    #[test]
    fn test_load_all_seeds_ledger_and_ids() {
        let store = Arc::new(InMemoryAccountStore::new());
        {
            let earlier = service_with(store.clone());
            earlier.create_account(request("alice", 10)).unwrap();
            earlier.create_account(request("bob", 20)).unwrap();
        }

        let service = service_with(store);
        assert!(matches!(
            service.get_balance(AccountId::new(1001)),
            Err(Error::AccountNotFound(_))
        ));
        assert_eq!(service.load_all().unwrap(), 2);
        assert_eq!(service.get_balance(AccountId::new(1002)).unwrap(), Decimal::from(20));

        let next = service.create_account(request("carol", 0)).unwrap();
        assert_eq!(next.id(), AccountId::new(1003));
    }

    #[test]
    fn test_load_account_is_explicit() {
        let store = Arc::new(InMemoryAccountStore::new());
        service_with(store.clone())
            .create_account(request("alice", 10))
            .unwrap();

        let service = service_with(store);
        let id = AccountId::new(1001);
        assert!(service.deposit(id, Decimal::ONE).is_err());

        service.load_account(id).unwrap();
        assert_eq!(service.deposit(id, Decimal::ONE).unwrap().balance_after, Decimal::from(11));
        assert!(matches!(
            service.load_account(AccountId::new(77)),
            Err(Error::AccountNotFound(_))
        ));
    }

    #[test]
    fn test_load_account_keeps_unflushed_balance() {
        let store = Arc::new(InMemoryAccountStore::new());
        let service = service_with(store.clone());
        let id = service.create_account(request("alice", 100)).unwrap().id();

        store.set_fail_updates(true);
        assert!(service.deposit(id, Decimal::from(50)).unwrap_err().is_retryable_flush());
        assert_eq!(store.stored_balance(id), Some(Decimal::from(100)));

        assert_eq!(service.load_account(id).unwrap().balance(), Decimal::from(150));
        assert_eq!(service.get_balance(id).unwrap(), Decimal::from(150));

        store.set_fail_updates(false);
        assert_eq!(service.retry_flush(id).unwrap(), Decimal::from(150));
        assert_eq!(store.stored_balance(id), Some(Decimal::from(150)));
    }

    #[test]
    fn test_id_allocator_saturates_at_max() {
        let ids = IdAllocator::new(i64::MAX);
        ids.observe(AccountId::new(i64::MAX));
        assert_eq!(ids.next(), AccountId::new(i64::MAX));
        assert_eq!(ids.next(), AccountId::new(i64::MAX));

        let ids = IdAllocator::new(1000);
        ids.observe(AccountId::new(i64::MAX));
        assert_eq!(ids.next(), AccountId::new(i64::MAX));
    }

    #[test]
    fn test_summary_counts_overdrawn() {
        let service = service_with(Arc::new(InMemoryAccountStore::new()));
        let mut overdraft = request("bob", 0);
        overdraft.variant = service.overdraft_variant(None).unwrap();

        service.create_account(request("alice", 100)).unwrap();
        let bob = service.create_account(overdraft).unwrap();
        service.withdraw(bob.id(), Decimal::from(300)).unwrap();

        let summary = service.summary();
        assert_eq!(summary.total_accounts, 2);
        assert_eq!(summary.total_balance, Decimal::from(-200));
        assert_eq!(summary.overdrawn_accounts, 1);
    }
}
