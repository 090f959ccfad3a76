//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The ledger core
//! depends only on these traits, not on concrete implementations.

mod account_store;

pub use account_store::AccountStore;
pub use crate::domain::result::PersistError;
