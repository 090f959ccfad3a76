//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. The ledger and
//! executor hold the in-memory state and its locking; the account service
//! is what front ends talk to.

pub mod account;
mod demo;
pub mod executor;
pub mod ledger;
pub mod logging;
pub mod migration;

pub use account::{AccountService, LedgerSummary, NewAccount};
pub use demo::{DemoOutcome, DemoReport, DemoService};
pub use executor::TransactionExecutor;
pub use ledger::Ledger;
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
