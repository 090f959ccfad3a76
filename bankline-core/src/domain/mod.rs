//! Core domain entities
//!
//! Pure data structures with their validation and policy rules - no I/O,
//! no locking.

mod account;
mod transaction;
pub mod result;

pub use account::{Account, AccountId, AccountVariant, Credential};
pub use transaction::{TransactionKind, TransactionReceipt, TransactionState};
