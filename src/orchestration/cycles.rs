//! Profit cycle close, listing and deletion.

use crate::clock::Clock;
use crate::db::repo::{cycles, lots, orders};
use crate::db::Repository;
use crate::domain::{CycleId, NewProfitCycle, ProfitCycle, TimeMs};
use crate::engine::{CostAttributor, PlaceholderLabels, RevenueAggregator};
use crate::orchestration::baseline::CycleBaseline;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Closes profit cycles one at a time.
///
/// A close runs in a single transaction whose first statement writes the
/// `close_guard` row, so it holds SQLite's write lock from the start. Closes
/// in this process also queue on `close_lock` so they do not spin on the
/// busy timeout.
pub struct ProfitCycleManager {
    repo: Arc<Repository>,
    baseline: Arc<dyn CycleBaseline>,
    clock: Arc<dyn Clock>,
    aggregator: RevenueAggregator,
    close_timeout: Duration,
    close_lock: Mutex<()>,
}

impl ProfitCycleManager {
    pub fn new(
        repo: Arc<Repository>,
        baseline: Arc<dyn CycleBaseline>,
        clock: Arc<dyn Clock>,
        labels: PlaceholderLabels,
        close_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            baseline,
            clock,
            aggregator: RevenueAggregator::new(labels),
            close_timeout,
            close_lock: Mutex::new(()),
        }
    }

    /// Close the cycle running since the last close and persist it.
    ///
    /// Not idempotent: two calls in a row produce two back-to-back cycles.
    ///
    /// # Errors
    /// `ComputationFailed` on any storage error or timeout. Nothing is
    /// persisted in either case.
    pub async fn close(&self) -> Result<ProfitCycle, CycleError> {
        let _guard = self.close_lock.lock().await;

        match tokio::time::timeout(self.close_timeout, self.close_in_transaction()).await {
            Ok(Ok(cycle)) => Ok(cycle),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Profit cycle close failed, rolled back");
                Err(CycleError::ComputationFailed(
                    "failed to compute profit cycle".to_string(),
                ))
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.close_timeout.as_millis() as u64,
                    "Profit cycle close timed out, rolled back"
                );
                Err(CycleError::ComputationFailed(format!(
                    "profit cycle close exceeded {}ms",
                    self.close_timeout.as_millis()
                )))
            }
        }
    }

    async fn close_in_transaction(&self) -> Result<ProfitCycle, sqlx::Error> {
        let mut tx = self.repo.begin().await?;

        let watermark = cycles::lock_close_guard(&mut *tx).await?;

        let anchor = self.baseline.most_recent_by_end_date(&mut *tx).await?;
        let start = anchor.as_ref().map_or(TimeMs::EPOCH, |a| a.end_ms);
        // Read after the lock so no payment can land at or before `end` once
        // this close commits.
        let end = self.clock.now().max(watermark).max(start);

        let sales = orders::fetch_sales_in_window(&mut *tx, start, end).await?;
        let revenue = self.aggregator.aggregate(&sales);

        let prior = self.baseline.most_recent_by_creation(&mut *tx).await?;
        let current_lots = lots::fetch_all_lots(&mut *tx).await?;
        let attributor = CostAttributor::new(prior.as_ref().map(|p| p.entries.as_slice()));
        let cost = attributor.attribute(&current_lots);

        tracing::debug!(
            start_ms = start.as_i64(),
            end_ms = end.as_i64(),
            revenue_anchor = ?anchor.as_ref().map(|a| a.cycle_id),
            snapshot_anchor = ?prior.as_ref().map(|p| p.cycle_id),
            sales = sales.len(),
            lots = current_lots.len(),
            "Computing profit cycle"
        );

        let new_cycle = NewProfitCycle {
            start_ms: start,
            end_ms: end,
            profit: revenue.total_revenue - cost.total_cost,
            revenue: revenue.total_revenue,
            cost: cost.total_cost,
            revenue_details: revenue.details,
            cost_details: cost.details,
            inventory_snapshot: cost.snapshot,
        };

        let cycle = cycles::insert_cycle(&mut *tx, new_cycle, self.clock.now()).await?;
        cycles::advance_close_watermark(&mut *tx, end).await?;
        tx.commit().await?;

        tracing::info!(
            cycle_id = %cycle.id,
            start_ms = cycle.start_ms.as_i64(),
            end_ms = cycle.end_ms.as_i64(),
            revenue = %cycle.revenue,
            cost = %cycle.cost,
            profit = %cycle.profit,
            "Profit cycle closed"
        );

        Ok(cycle)
    }

    /// All cycles, newest first.
    pub async fn list(&self) -> Result<Vec<ProfitCycle>, CycleError> {
        Ok(self.repo.list_cycles().await?)
    }

    pub async fn get(&self, id: CycleId) -> Result<ProfitCycle, CycleError> {
        self.repo
            .get_cycle(id)
            .await?
            .ok_or(CycleError::NotFound(id))
    }

    /// Remove a cycle. The next close re-resolves its baselines from what is
    /// left, and already-closed cycles are not recomputed.
    pub async fn delete(&self, id: CycleId) -> Result<(), CycleError> {
        let mut tx = self.repo.begin().await?;
        if !cycles::delete_cycle(&mut *tx, id).await? {
            return Err(CycleError::NotFound(id));
        }
        tx.commit().await?;

        tracing::info!(cycle_id = %id, "Profit cycle deleted");
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("profit cycle {0} not found")]
    NotFound(CycleId),
    #[error("{0}")]
    ComputationFailed(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}
