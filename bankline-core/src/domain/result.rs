//! Result and error types for the core library

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::account::AccountId;
use super::transaction::{TransactionReceipt, TransactionState};

/// Failure reported by an `AccountStore` implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistError {
    #[error("account {0} already exists in the store")]
    Duplicate(AccountId),

    #[error("account {0} does not exist in the store")]
    Missing(AccountId),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl PersistError {
    pub fn backend(msg: impl std::fmt::Display) -> Self {
        Self::Backend(msg.to_string())
    }
}

/// Core library error type
///
/// Policy and validation failures never touch state. `PersistenceFailure`
/// is the one variant reported after a committed mutation: the balance
/// changed in memory and only the durable write needs retrying.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid amount: {0} (must be greater than zero)")]
    InvalidAmount(Decimal),

    #[error("Insufficient funds in account {account_id}: requested {requested}, available {available}")]
    InsufficientFunds {
        account_id: AccountId,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Overdraft limit exceeded on account {account_id}: requested {requested}, limit {limit}")]
    OverdraftExceeded {
        account_id: AccountId,
        requested: Decimal,
        limit: Decimal,
    },

    #[error("Amount {amount} would take account {account_id} outside the representable range")]
    AmountOverflow {
        account_id: AccountId,
        amount: Decimal,
    },

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Timed out after {waited:?} waiting for the lock on account {account_id}")]
    LockTimeout {
        account_id: AccountId,
        waited: Duration,
    },

    #[error("Account {account_id} updated in memory but not saved: {source}")]
    PersistenceFailure {
        account_id: AccountId,
        #[source]
        source: PersistError,
        /// Receipt of the committed transaction, when a transaction caused the flush
        receipt: Option<Box<TransactionReceipt>>,
    },

    #[error("Authentication failed for account {0}")]
    AuthenticationFailed(AccountId),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] PersistError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Stable snake_case tag, safe to write to the event log
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidAmount(_) => "invalid_amount",
            Error::InsufficientFunds { .. } => "insufficient_funds",
            Error::OverdraftExceeded { .. } => "overdraft_exceeded",
            Error::AmountOverflow { .. } => "amount_overflow",
            Error::AccountNotFound(_) => "account_not_found",
            Error::LockTimeout { .. } => "lock_timeout",
            Error::PersistenceFailure { .. } => "persistence_failure",
            Error::AuthenticationFailed(_) => "authentication_failed",
            Error::Validation(_) => "validation",
            Error::Store(_) => "store",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
        }
    }

    /// True when the request itself was rejected by amount or overdraft policy
    pub fn is_policy(&self) -> bool {
        matches!(
            self,
            Error::InvalidAmount(_)
                | Error::InsufficientFunds { .. }
                | Error::OverdraftExceeded { .. }
                | Error::AmountOverflow { .. }
        )
    }

    /// True when the mutation went through and only the save must be retried
    pub fn is_retryable_flush(&self) -> bool {
        matches!(self, Error::PersistenceFailure { .. })
    }

    /// Where a transaction stopped when it failed with this error
    ///
    /// `None` for errors raised before a transaction existed (unknown
    /// account, bad credentials, store and io errors).
    pub fn transaction_state(&self) -> Option<TransactionState> {
        match self {
            e if e.is_policy() => Some(TransactionState::Rejected),
            Error::LockTimeout { .. } => Some(TransactionState::LockTimeout),
            Error::PersistenceFailure { receipt: Some(_), .. } => Some(TransactionState::Applied),
            _ => None,
        }
    }

    /// Receipt of the committed transaction behind a `PersistenceFailure`
    pub fn receipt(&self) -> Option<&TransactionReceipt> {
        match self {
            Error::PersistenceFailure { receipt, .. } => receipt.as_deref(),
            _ => None,
        }
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
        }
    }

    /// Create a failed result
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            error_kind: None,
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => {
                let mut failed = Self::fail(e.to_string());
                failed.error_kind = Some(e.kind().to_string());
                failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_result_ok() {
        let result: OperationResult<i32> = OperationResult::ok(42);
        assert!(result.success);
        assert_eq!(result.data, Some(42));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_operation_result_fail() {
        let result: OperationResult<i32> = OperationResult::fail("Something went wrong");
        assert!(!result.success);
        assert!(result.data.is_none());
        assert_eq!(result.error, Some("Something went wrong".to_string()));
    }

    #[test]
    fn test_from_result_carries_kind() {
        let err: Result<i32> = Err(Error::AccountNotFound(AccountId::new(7)));
        let result: OperationResult<i32> = err.into();
        assert!(!result.success);
        assert_eq!(result.error_kind.as_deref(), Some("account_not_found"));
        assert!(result.error.unwrap().contains("7"));
    }

    #[test]
    fn test_policy_and_flush_classification() {
        let policy = Error::InvalidAmount(Decimal::ZERO);
        assert!(policy.is_policy());
        assert!(!policy.is_retryable_flush());

        let flush = Error::PersistenceFailure {
            account_id: AccountId::new(1001),
            source: PersistError::backend("disk full"),
            receipt: None,
        };
        assert!(!flush.is_policy());
        assert!(flush.is_retryable_flush());
        assert_eq!(flush.kind(), "persistence_failure");
        assert!(flush.receipt().is_none());
    }

    #[test]
    fn test_failed_transaction_states() {
        let id = AccountId::new(1001);
        let rejected = Error::InsufficientFunds {
            account_id: id,
            requested: Decimal::from(1500),
            available: Decimal::from(1200),
        };
        assert_eq!(rejected.transaction_state(), Some(TransactionState::Rejected));

        let timeout = Error::LockTimeout {
            account_id: id,
            waited: Duration::from_millis(250),
        };
        assert_eq!(timeout.transaction_state(), Some(TransactionState::LockTimeout));

        let unsaved = Error::PersistenceFailure {
            account_id: id,
            source: PersistError::backend("disk full"),
            receipt: Some(Box::new(TransactionReceipt::new(
                id,
                crate::domain::transaction::TransactionKind::Deposit,
                Decimal::from(200),
                Decimal::from(1200),
            ))),
        };
        assert_eq!(unsaved.transaction_state(), Some(TransactionState::Applied));
        assert_eq!(unsaved.receipt().map(|r| r.balance_after), Some(Decimal::from(1200)));

        assert_eq!(Error::AccountNotFound(id).transaction_state(), None);
    }
}
