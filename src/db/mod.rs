//! SQLite persistence for the ledger.
//!
//! `migrations` opens the pool and applies `schema.sql`. `repo` holds the
//! per-aggregate query functions plus the pooled [`Repository`] facade.

pub mod migrations;
pub mod repo;

pub use migrations::{init_db, init_db_with};
pub use repo::Repository;
