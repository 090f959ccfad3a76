//! Demo service - concurrent transactions against one account
//!
//! Starts a depositing thread and a withdrawing thread at the same moment
//! and reports what each one saw. Both go through the executor, so the
//! final balance is the same whichever thread wins the lock.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::result::{Error, Result};
use crate::domain::{AccountId, TransactionKind};

use super::executor::TransactionExecutor;

/// What one demo thread did
#[derive(Debug, Clone, Serialize)]
pub struct DemoOutcome {
    pub thread: String,
    pub kind: TransactionKind,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_after: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

/// Result of a demo run
#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub account_id: AccountId,
    pub starting_balance: Decimal,
    pub outcomes: Vec<DemoOutcome>,
    pub final_balance: Decimal,
}

type DemoTask = Box<dyn FnOnce() -> Option<DemoOutcome> + Send>;

/// Holds spawned threads until every one exists, or sends them home unrun
struct StartGate {
    open: Mutex<Option<bool>>,
    changed: Condvar,
}

impl StartGate {
    fn new() -> Self {
        Self {
            open: Mutex::new(None),
            changed: Condvar::new(),
        }
    }

    /// Block until released; true means run
    fn wait(&self) -> bool {
        let mut open = self.open.lock();
        while open.is_none() {
            self.changed.wait(&mut open);
        }
        *open == Some(true)
    }

    fn release(&self, run: bool) {
        *self.open.lock() = Some(run);
        self.changed.notify_all();
    }
}

pub struct DemoService {
    executor: Arc<TransactionExecutor>,
}

impl DemoService {
    pub const DEPOSIT_AMOUNT: i64 = 200;
    pub const WITHDRAW_AMOUNT: i64 = 150;

    pub fn new(executor: Arc<TransactionExecutor>) -> Self {
        Self { executor }
    }

    /// Run the default pair: deposit 200 and withdraw 150
    pub fn run(&self, account_id: AccountId) -> Result<DemoReport> {
        self.run_with(
            account_id,
            &[
                (TransactionKind::Deposit, Decimal::from(Self::DEPOSIT_AMOUNT)),
                (TransactionKind::Withdraw, Decimal::from(Self::WITHDRAW_AMOUNT)),
            ],
        )
    }

    /// Run one thread per operation, all released together
    pub fn run_with(
        &self,
        account_id: AccountId,
        operations: &[(TransactionKind, Decimal)],
    ) -> Result<DemoReport> {
        self.run_spawning(account_id, operations, |name, task| {
            thread::Builder::new().name(name).spawn(task)
        })
    }

    fn run_spawning<S>(
        &self,
        account_id: AccountId,
        operations: &[(TransactionKind, Decimal)],
        mut spawn: S,
    ) -> Result<DemoReport>
    where
        S: FnMut(String, DemoTask) -> io::Result<JoinHandle<Option<DemoOutcome>>>,
    {
        let starting_balance = self.executor.ledger().get(account_id)?.balance();
        let gate = Arc::new(StartGate::new());

        let mut handles = Vec::with_capacity(operations.len());
        for (index, &(kind, amount)) in operations.iter().enumerate() {
            let executor = Arc::clone(&self.executor);
            let waiting = Arc::clone(&gate);
            let name = format!("{}-{}", kind, index + 1);

            let thread_name = name.clone();
            let task: DemoTask = Box::new(move || {
                if !waiting.wait() {
                    return None;
                }
                let result = executor.execute(account_id, kind, amount);
                Some(outcome(thread_name, kind, amount, result.map(|r| r.balance_after)))
            });

            match spawn(name, task) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Threads already started leave without touching the account
                    gate.release(false);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(e.into());
                }
            }
        }
        gate.release(true);

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            let outcome = handle
                .join()
                .map_err(|_| Error::validation("demo thread panicked"))?;
            outcomes.extend(outcome);
        }

        Ok(DemoReport {
            account_id,
            starting_balance,
            outcomes,
            final_balance: self.executor.ledger().get(account_id)?.balance(),
        })
    }
}

fn outcome(
    thread: String,
    kind: TransactionKind,
    amount: Decimal,
    result: Result<Decimal>,
) -> DemoOutcome {
    let (balance_after, error_kind) = match result {
        Ok(balance) => (Some(balance), None),
        Err(e) => (None, Some(e.kind().to_string())),
    };
    DemoOutcome {
        thread,
        kind,
        amount,
        balance_after,
        error_kind,
    }
}
