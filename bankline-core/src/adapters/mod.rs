//! Adapter implementations
//!
//! Adapters implement the `AccountStore` port:
//! - DuckDB for durable storage
//! - An in-memory map for tests and embedders without a database

pub mod duckdb;
pub mod memory;
