//! Tests for opening the ledger database repeatedly
//!
//! Run with: cargo test --test connection_retry_test -- --nocapture

use std::time::Instant;

use rust_decimal::Decimal;
use tempfile::TempDir;

use bankline_core::adapters::duckdb::DuckDbAccountStore;
use bankline_core::ports::AccountStore;
use bankline_core::{Account, AccountId, AccountVariant, Credential};

/// Open and close the store several times; each open sees earlier writes
#[test]
fn test_sequential_connections() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test_sequential.duckdb");

    for i in 0..5i64 {
        let start = Instant::now();
        let store = DuckDbAccountStore::new(&db_path).unwrap();
        store.ensure_schema().unwrap();
        println!("Connection {}: opened in {:?}", i, start.elapsed());

        assert_eq!(store.fetch_all().unwrap().len() as i64, i);

        let account = Account::open(
            AccountId::new(1001 + i),
            format!("Account {}", i),
            Credential::new("token"),
            Decimal::from(i),
            AccountVariant::Standard,
        )
        .unwrap();
        store.create(&account).unwrap();
    }
}

/// Migrations run once; reopening applies nothing new
#[test]
fn test_reopen_does_not_reapply_migrations() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test_migrations.duckdb");

    let first = {
        let store = DuckDbAccountStore::new(&db_path).unwrap();
        store.run_migrations().unwrap()
    };
    assert!(!first.applied.is_empty());

    let store = DuckDbAccountStore::new(&db_path).unwrap();
    let second = store.run_migrations().unwrap();
    assert!(second.applied.is_empty());
    assert_eq!(second.already_applied, first.applied.len());
}
