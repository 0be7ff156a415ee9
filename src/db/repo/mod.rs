//! Repository layer for database operations.
//!
//! Query functions take a `&mut SqliteConnection` so orchestration can run
//! several of them inside one transaction. `Repository` wraps the pool and
//! offers pool-level shortcuts for single reads.
//! - `catalog.rs` - ingredients, products, dining tables
//! - `lots.rs` - purchase orders and inventory lots
//! - `orders.rs` - orders, line items, payments, sales ledger reads
//! - `cycles.rs` - profit cycles, baselines and the close guard

pub mod catalog;
pub mod cycles;
pub mod lots;
pub mod orders;

pub use cycles::{CycleAnchor, SnapshotBaseline};

use crate::domain::Decimal;
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::pool::PoolConnection;
use sqlx::{Row, Transaction};

/// Repository for database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction. Dropping it without `commit` rolls back.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>, sqlx::Error> {
        self.pool.acquire().await
    }
}

/// Decode a TEXT decimal column, failing instead of defaulting on bad data.
pub(crate) fn decimal_col(row: &SqliteRow, col: &str) -> Result<Decimal, sqlx::Error> {
    let raw: String = row.try_get(col)?;
    parse_decimal(col, &raw)
}

pub(crate) fn opt_decimal_col(row: &SqliteRow, col: &str) -> Result<Option<Decimal>, sqlx::Error> {
    let raw: Option<String> = row.try_get(col)?;
    raw.map(|s| parse_decimal(col, &s)).transpose()
}

fn parse_decimal(col: &str, raw: &str) -> Result<Decimal, sqlx::Error> {
    Decimal::from_str_canonical(raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}

pub(crate) fn json_col<T: serde::de::DeserializeOwned>(
    row: &SqliteRow,
    col: &str,
) -> Result<T, sqlx::Error> {
    let raw: String = row.try_get(col)?;
    serde_json::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: col.to_string(),
        source: Box::new(e),
    })
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, sqlx::Error> {
    serde_json::to_string(value).map_err(|e| sqlx::Error::Protocol(format!("encode json: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_to_json_serializes() {
        let json = to_json(&vec![1, 2, 3]).unwrap();
        assert_eq!(json, "[1,2,3]");
    }

    #[test]
    fn test_to_json_failure_is_protocol_error() {
        // JSON object keys must be strings.
        let mut map = HashMap::new();
        map.insert((1, 2), 3);
        match to_json(&map) {
            Err(sqlx::Error::Protocol(msg)) => assert!(msg.starts_with("encode json")),
            other => panic!("expected Protocol error, got {other:?}"),
        }
    }
}
