//! Account domain model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use super::result::{Error, Result};

/// Ledger-wide account identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(i64);

impl AccountId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| Error::validation(format!("invalid account id: {:?}", s)))
    }
}

/// Opaque credential token
///
/// The token is produced by whatever authenticates the user (the CLI hashes
/// the password). The core only ever compares tokens, in constant time.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token, for persistence adapters only
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, candidate: &Credential) -> bool {
        self.0.as_bytes().ct_eq(candidate.0.as_bytes()).into()
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl Eq for Credential {}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Withdraw policy of an account
///
/// A new policy is a new case here plus its arm in `check_withdraw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AccountVariant {
    /// Balance may not go below zero
    Standard,
    /// Balance may go down to `-limit`
    Overdraft { limit: Decimal },
}

impl AccountVariant {
    /// Overdraft variant; the limit must be strictly positive
    pub fn overdraft(limit: Decimal) -> Result<Self> {
        if limit <= Decimal::ZERO {
            return Err(Error::validation(format!(
                "overdraft limit must be positive, got {}",
                limit
            )));
        }
        Ok(Self::Overdraft { limit })
    }

    /// Lowest balance a committed withdraw may leave behind
    pub fn withdraw_floor(&self) -> Decimal {
        match self {
            AccountVariant::Standard => Decimal::ZERO,
            AccountVariant::Overdraft { limit } => -*limit,
        }
    }

    /// Short storage / display name
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountVariant::Standard => "standard",
            AccountVariant::Overdraft { .. } => "overdraft",
        }
    }

    pub fn overdraft_limit(&self) -> Option<Decimal> {
        match self {
            AccountVariant::Standard => None,
            AccountVariant::Overdraft { limit } => Some(*limit),
        }
    }

    fn check_withdraw(&self, account_id: AccountId, balance: Decimal, amount: Decimal) -> Result<()> {
        match self {
            AccountVariant::Standard => {
                if amount > balance {
                    return Err(Error::InsufficientFunds {
                        account_id,
                        requested: amount,
                        available: balance.max(Decimal::ZERO),
                    });
                }
            }
            AccountVariant::Overdraft { limit } => {
                // No headroom sum means the headroom exceeds any Decimal
                let exceeded = balance
                    .checked_add(*limit)
                    .is_some_and(|headroom| amount > headroom);
                if exceeded {
                    return Err(Error::OverdraftExceeded {
                        account_id,
                        requested: amount,
                        limit: *limit,
                    });
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for AccountVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountVariant::Standard => f.write_str("standard"),
            AccountVariant::Overdraft { limit } => write!(f, "overdraft (limit {})", limit),
        }
    }
}

/// A bank account
///
/// Deposit and withdraw take `&mut self` and do no locking of their own;
/// the ledger hands out exclusive access one transaction at a time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    id: AccountId,
    name: String,
    #[serde(skip_serializing)]
    credential: Credential,
    balance: Decimal,
    variant: AccountVariant,
    created_at: DateTime<Utc>,
}

impl Account {
    /// Open a new account
    pub fn open(
        id: AccountId,
        name: impl Into<String>,
        credential: Credential,
        initial_balance: Decimal,
        variant: AccountVariant,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::validation("account name cannot be empty"));
        }
        if initial_balance < Decimal::ZERO {
            return Err(Error::validation(format!(
                "initial balance cannot be negative, got {}",
                initial_balance
            )));
        }
        Ok(Self::restore(
            id,
            name,
            credential,
            initial_balance,
            variant,
            Utc::now(),
        ))
    }

    /// Rebuild an account from a stored record, without opening checks
    pub fn restore(
        id: AccountId,
        name: String,
        credential: Credential,
        balance: Decimal,
        variant: AccountVariant,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            credential,
            balance,
            variant,
            created_at,
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn variant(&self) -> AccountVariant {
        self.variant
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Largest amount a single withdraw could take right now
    pub fn available_to_withdraw(&self) -> Decimal {
        self.balance
            .checked_sub(self.variant.withdraw_floor())
            .unwrap_or(Decimal::MAX)
            .max(Decimal::ZERO)
    }

    pub fn deposit(&mut self, amount: Decimal) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }
        self.balance = self.balance.checked_add(amount).ok_or(Error::AmountOverflow {
            account_id: self.id,
            amount,
        })?;
        Ok(self.balance)
    }

    pub fn withdraw(&mut self, amount: Decimal) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }
        self.variant.check_withdraw(self.id, self.balance, amount)?;
        self.balance = self.balance.checked_sub(amount).ok_or(Error::AmountOverflow {
            account_id: self.id,
            amount,
        })?;
        Ok(self.balance)
    }

    /// Exact, case-sensitive token comparison; never fails
    pub fn check_credential(&self, candidate: &Credential) -> bool {
        self.credential.matches(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(v: i64) -> Decimal {
        Decimal::from(v)
    }

    fn standard(balance: Decimal) -> Account {
        Account::open(
            AccountId::new(1001),
            "Alice",
            Credential::new("s3cret"),
            balance,
            AccountVariant::Standard,
        )
        .unwrap()
    }

    fn overdraft(balance: Decimal, limit: Decimal) -> Account {
        Account::open(
            AccountId::new(2001),
            "Bob",
            Credential::new("hunter2"),
            balance,
            AccountVariant::overdraft(limit).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_deposit_adds_to_balance() {
        let mut account = standard(dec(1000));
        assert_eq!(account.deposit(dec(200)).unwrap(), dec(1200));
        assert_eq!(account.balance(), dec(1200));
    }

    #[test]
    fn test_non_positive_amounts_are_rejected() {
        let mut account = standard(dec(50));
        for amount in [dec(0), dec(-5)] {
            assert!(matches!(account.deposit(amount), Err(Error::InvalidAmount(_))));
            assert!(matches!(account.withdraw(amount), Err(Error::InvalidAmount(_))));
        }
        assert_eq!(account.balance(), dec(50));
    }

    #[test]
    fn test_standard_withdraw_cannot_overdraw() {
        let mut account = standard(dec(1200));
        let err = account.withdraw(dec(1500)).unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));
        assert_eq!(account.balance(), dec(1200));

        assert_eq!(account.withdraw(dec(1200)).unwrap(), dec(0));
    }

    #[test]
    fn test_overdraft_withdraw_stops_at_limit() {
        let mut account = overdraft(dec(100), dec(1000));
        assert_eq!(account.withdraw(dec(600)).unwrap(), dec(-500));
        assert_eq!(account.available_to_withdraw(), dec(500));

        let err = account.withdraw(Decimal::new(50001, 2)).unwrap_err();
        assert!(matches!(err, Error::OverdraftExceeded { .. }));
        assert_eq!(account.balance(), dec(-500));

        assert_eq!(account.withdraw(dec(500)).unwrap(), dec(-1000));
    }

    #[test]
    fn test_deposit_past_decimal_range_is_rejected() {
        let mut account = standard(Decimal::MAX);
        let err = account.deposit(dec(1)).unwrap_err();
        assert!(matches!(err, Error::AmountOverflow { .. }));
        assert!(err.is_policy());
        assert_eq!(account.balance(), Decimal::MAX);

        let mut account = standard(dec(0));
        let large = Decimal::from_str("50000000000000000000000000000").unwrap();
        assert_eq!(account.deposit(large).unwrap(), large);
        assert_eq!(account.deposit(large).unwrap_err().kind(), "amount_overflow");
        assert_eq!(account.balance(), large);
    }

    #[test]
    fn test_overdraft_near_decimal_limits() {
        let mut account = overdraft(Decimal::MAX, Decimal::MAX);
        assert_eq!(account.available_to_withdraw(), Decimal::MAX);
        assert_eq!(account.withdraw(Decimal::MAX).unwrap(), dec(0));
        assert_eq!(account.withdraw(Decimal::MAX).unwrap(), Decimal::MIN);
        assert_eq!(account.available_to_withdraw(), dec(0));

        let err = account.withdraw(dec(1)).unwrap_err();
        assert!(matches!(err, Error::OverdraftExceeded { .. }));
        assert_eq!(account.balance(), Decimal::MIN);

        let mut account = overdraft(dec(0), Decimal::MAX);
        assert_eq!(account.withdraw(Decimal::MAX).unwrap(), Decimal::MIN);
        assert!(account.deposit(Decimal::MAX).is_ok());
        assert_eq!(account.balance(), dec(0));
    }

    #[test]
    fn test_overdraft_limit_must_be_positive() {
        assert!(AccountVariant::overdraft(dec(0)).is_err());
        assert!(AccountVariant::overdraft(dec(-1)).is_err());
        assert_eq!(
            AccountVariant::overdraft(dec(250)).unwrap().withdraw_floor(),
            dec(-250)
        );
    }

    #[test]
    fn test_open_validates_input() {
        let blank = Account::open(
            AccountId::new(1),
            "  ",
            Credential::new("x"),
            dec(0),
            AccountVariant::Standard,
        );
        assert!(blank.is_err());

        let negative = Account::open(
            AccountId::new(1),
            "Carol",
            Credential::new("x"),
            dec(-1),
            AccountVariant::Standard,
        );
        assert!(negative.is_err());
    }

    #[test]
    fn test_check_credential_is_exact() {
        let account = standard(dec(0));
        assert!(account.check_credential(&Credential::new("s3cret")));
        assert!(!account.check_credential(&Credential::new("S3cret")));
        assert!(!account.check_credential(&Credential::new("s3cre")));
        assert!(!account.check_credential(&Credential::new("s3cret ")));
        assert!(!account.check_credential(&Credential::new("")));
    }

    #[test]
    fn test_credential_is_redacted() {
        let account = standard(dec(0));
        let debug = format!("{:?}", account);
        assert!(!debug.contains("s3cret"));

        let json = serde_json::to_string(&account).unwrap();
        assert!(!json.contains("s3cret"));
    }

    #[test]
    fn test_account_id_parsing() {
        assert_eq!("1001".parse::<AccountId>().unwrap(), AccountId::new(1001));
        assert_eq!(" 42 ".parse::<AccountId>().unwrap().get(), 42);
        assert!("abc".parse::<AccountId>().is_err());
    }
}
