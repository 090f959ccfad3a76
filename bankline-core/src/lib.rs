//! Bankline Core - a concurrent in-memory account ledger
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Accounts, their variants and withdraw policy, transaction receipts
//! - **ports**: The `AccountStore` trait the ledger persists through
//! - **services**: Ledger cache, transaction executor, account service, logging
//! - **adapters**: Concrete stores (DuckDB, in-memory)

pub mod domain;
pub mod ports;
pub mod services;
pub mod adapters;
pub mod config;
pub mod migrations;
pub mod log_migrations;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::duckdb::DuckDbAccountStore;
use config::Config;
use ports::AccountStore;
use services::*;

// Re-export commonly used types at crate root
pub use domain::{
    Account, AccountId, AccountVariant, Credential, TransactionKind, TransactionReceipt,
    TransactionState,
};
pub use domain::result::{Error, OperationResult, PersistError};
pub use services::{EntryPoint, LogEvent, LoggingService};

/// Main context for Bankline operations
///
/// Holds the configuration, the store, the ledger and the services built on
/// them. The ledger is seeded from the store when the context is created.
pub struct BanklineContext {
    pub config: Config,
    pub store: Arc<dyn AccountStore>,
    pub ledger: Arc<Ledger>,
    pub executor: Arc<TransactionExecutor>,
    pub account_service: AccountService,
    pub demo_service: DemoService,
}

impl BanklineContext {
    /// Open `bankline.duckdb` in the given directory and load every account
    pub fn new(bankline_dir: &Path) -> Result<Self> {
        let config = Config::load(bankline_dir)?;

        let db_path = bankline_dir.join("bankline.duckdb");
        let store = Arc::new(DuckDbAccountStore::new(&db_path)?);
        store.ensure_schema()?;

        let context = Self::with_store(config, store);
        context.account_service.load_all()?;
        Ok(context)
    }

    /// Build a context over any store; the ledger starts empty
    pub fn with_store(config: Config, store: Arc<dyn AccountStore>) -> Self {
        let ledger = Arc::new(Ledger::new());
        let executor = Arc::new(
            TransactionExecutor::new(Arc::clone(&ledger), Arc::clone(&store))
                .with_lock_timeout(config.lock_timeout),
        );
        let account_service = AccountService::new(
            Arc::clone(&ledger),
            Arc::clone(&store),
            Arc::clone(&executor),
            config.first_account_id,
            config.default_overdraft_limit,
        );
        let demo_service = DemoService::new(Arc::clone(&executor));

        Self {
            config,
            store,
            ledger,
            executor,
            account_service,
            demo_service,
        }
    }
}
