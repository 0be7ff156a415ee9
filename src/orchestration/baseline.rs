//! Lookups that anchor a close to the cycles already on record.
//!
//! The revenue window starts at the end of the closed cycle with the latest
//! `end_ms`. Cost attribution measures from the snapshot on the most recently
//! *created* cycle. The two normally agree and are kept separate so a
//! divergence after out-of-order deletes stays visible.

use crate::db::repo::cycles;
use crate::db::repo::{CycleAnchor, SnapshotBaseline};
use async_trait::async_trait;
use sqlx::sqlite::SqliteConnection;
use std::fmt;

/// Baseline resolution, queried inside the close transaction.
#[async_trait]
pub trait CycleBaseline: Send + Sync + fmt::Debug {
    /// Closed cycle with the greatest end timestamp.
    async fn most_recent_by_end_date(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Option<CycleAnchor>, sqlx::Error>;

    /// Cycle created last, whose snapshot seeds the next cost attribution.
    async fn most_recent_by_creation(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Option<SnapshotBaseline>, sqlx::Error>;
}

/// Reads both baselines from the `profit_cycles` table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlCycleBaseline;

#[async_trait]
impl CycleBaseline for SqlCycleBaseline {
    async fn most_recent_by_end_date(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Option<CycleAnchor>, sqlx::Error> {
        cycles::most_recent_by_end_date(conn).await
    }

    async fn most_recent_by_creation(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Option<SnapshotBaseline>, sqlx::Error> {
        cycles::most_recent_by_creation(conn).await
    }
}

/// Returns fixed baselines regardless of what is stored. For tests.
#[derive(Debug, Clone, Default)]
pub struct FixedCycleBaseline {
    anchor: Option<CycleAnchor>,
    snapshot: Option<SnapshotBaseline>,
}

impl FixedCycleBaseline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_anchor(mut self, anchor: CycleAnchor) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn with_snapshot(mut self, snapshot: SnapshotBaseline) -> Self {
        self.snapshot = Some(snapshot);
        self
    }
}

#[async_trait]
impl CycleBaseline for FixedCycleBaseline {
    async fn most_recent_by_end_date(
        &self,
        _conn: &mut SqliteConnection,
    ) -> Result<Option<CycleAnchor>, sqlx::Error> {
        Ok(self.anchor.clone())
    }

    async fn most_recent_by_creation(
        &self,
        _conn: &mut SqliteConnection,
    ) -> Result<Option<SnapshotBaseline>, sqlx::Error> {
        Ok(self.snapshot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::domain::{CycleId, TimeMs};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sql_baseline_empty_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db").to_string_lossy().to_string();
        let pool = init_db(&db_path).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let baseline = SqlCycleBaseline;
        assert!(baseline
            .most_recent_by_end_date(&mut conn)
            .await
            .unwrap()
            .is_none());
        assert!(baseline
            .most_recent_by_creation(&mut conn)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_fixed_baseline_returns_configured_values() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db").to_string_lossy().to_string();
        let pool = init_db(&db_path).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let anchor = CycleAnchor {
            cycle_id: CycleId::new(7),
            end_ms: TimeMs::new(5_000),
        };
        let baseline = FixedCycleBaseline::new().with_anchor(anchor.clone());

        assert_eq!(
            baseline.most_recent_by_end_date(&mut conn).await.unwrap(),
            Some(anchor)
        );
        assert_eq!(baseline.most_recent_by_creation(&mut conn).await.unwrap(), None);
    }
}
