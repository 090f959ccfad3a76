//! Transaction request and receipt types

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::AccountId;

/// The two balance mutations the executor knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdraw",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of a single executed transaction
///
/// Success runs Requested → Locked → Validated → Applied → Flushed.
/// A policy failure stops at Rejected (after Locked); contention stops at
/// LockTimeout (before Locked).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Requested,
    Locked,
    Validated,
    Applied,
    Flushed,
    Rejected,
    LockTimeout,
}

impl TransactionState {
    /// Whether the balance change is visible in memory in this state
    pub fn is_committed(&self) -> bool {
        matches!(self, TransactionState::Applied | TransactionState::Flushed)
    }

    /// Whether `next` is a legal step from this state
    pub fn can_advance_to(&self, next: TransactionState) -> bool {
        use TransactionState::*;
        matches!(
            (self, next),
            (Requested, Locked)
                | (Requested, LockTimeout)
                | (Locked, Validated)
                | (Locked, Rejected)
                | (Validated, Applied)
                | (Applied, Flushed)
        )
    }
}

const APPLIED_PATH: [TransactionState; 4] = [
    TransactionState::Requested,
    TransactionState::Locked,
    TransactionState::Validated,
    TransactionState::Applied,
];

/// Outcome of a successful deposit or withdraw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub id: Uuid,
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub state: TransactionState,
    /// Every state the transaction passed through, ending with `state`
    pub history: Vec<TransactionState>,
    pub executed_at: DateTime<Utc>,
}

impl TransactionReceipt {
    pub fn new(
        account_id: AccountId,
        kind: TransactionKind,
        amount: Decimal,
        balance_after: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            kind,
            amount,
            balance_after,
            state: TransactionState::Applied,
            history: APPLIED_PATH.to_vec(),
            executed_at: Utc::now(),
        }
    }

    /// Record that the balance reached the store; no-op once flushed
    pub fn mark_flushed(&mut self) {
        if self.state.can_advance_to(TransactionState::Flushed) {
            self.state = TransactionState::Flushed;
            self.history.push(TransactionState::Flushed);
        }
    }
}
