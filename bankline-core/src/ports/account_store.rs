//! Account store port - durable storage abstraction

use rust_decimal::Decimal;

use crate::domain::result::PersistError;
use crate::domain::{Account, AccountId};

/// Durable shadow copy of the ledger
///
/// The ledger is authoritative while the process runs; the store is only
/// touched at creation, at startup/explicit load, and on balance flush.
pub trait AccountStore: Send + Sync {
    /// Insert a new record; fails with `PersistError::Duplicate` if the id exists
    fn create(&self, account: &Account) -> Result<(), PersistError>;

    /// Point lookup
    fn fetch(&self, id: AccountId) -> Result<Option<Account>, PersistError>;

    /// Full scan, used to seed the ledger at startup
    fn fetch_all(&self) -> Result<Vec<Account>, PersistError>;

    /// Overwrite the stored balance; writing the same value twice is harmless
    fn update_balance(&self, id: AccountId, balance: Decimal) -> Result<(), PersistError>;
}
