//! Purchases and stock counts against the inventory lots.

use crate::clock::Clock;
use crate::db::repo::lots;
use crate::db::Repository;
use crate::domain::{Decimal, IngredientId, InventoryLot, LotId, PurchaseLine, PurchaseOrder, TimeMs};
use std::sync::Arc;
use thiserror::Error;

#[derive(Clone)]
pub struct InventoryService {
    repo: Arc<Repository>,
    clock: Arc<dyn Clock>,
}

impl InventoryService {
    pub fn new(repo: Arc<Repository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Record a single-line purchase and return the new lot.
    pub async fn record_purchase(
        &self,
        ingredient_id: IngredientId,
        qty: Decimal,
        unit_cost: Decimal,
    ) -> Result<InventoryLot, InventoryError> {
        let line = PurchaseLine {
            ingredient_id,
            qty,
            unit_cost,
        };
        let purchase = self.record_purchase_order(None, None, vec![line]).await?;
        purchase
            .lots
            .into_iter()
            .next()
            .ok_or_else(|| InventoryError::BadRequest("purchase created no lot".to_string()))
    }

    /// Record a purchase order with one lot per line, all or nothing.
    ///
    /// `purchased_at` defaults to now.
    pub async fn record_purchase_order(
        &self,
        supplier: Option<&str>,
        purchased_at: Option<TimeMs>,
        lines: Vec<PurchaseLine>,
    ) -> Result<PurchaseOrder, InventoryError> {
        if lines.is_empty() {
            return Err(InventoryError::BadRequest(
                "purchase order needs at least one line".to_string(),
            ));
        }
        for line in &lines {
            if !line.qty.is_positive() {
                return Err(InventoryError::InvalidQuantity(format!(
                    "purchased quantity must be greater than 0, got {}",
                    line.qty
                )));
            }
            if line.unit_cost.is_negative() {
                return Err(InventoryError::InvalidQuantity(format!(
                    "unit cost must not be negative, got {}",
                    line.unit_cost
                )));
            }
        }

        let now = self.clock.now();
        let purchased_at = purchased_at.unwrap_or(now);

        let mut tx = self.repo.begin().await?;
        let purchase =
            lots::insert_purchase_order(&mut *tx, supplier, purchased_at, &lines, now).await?;
        tx.commit().await?;

        tracing::info!(
            purchase_order_id = %purchase.id,
            lots = purchase.lots.len(),
            "Purchase recorded"
        );
        Ok(purchase)
    }

    /// Overwrite a lot's counted remaining quantity, and optionally its unit
    /// cost.
    ///
    /// # Errors
    /// `InvalidQuantity` if `remaining` is negative or above the lot's
    /// original quantity, or the unit cost is negative.
    pub async fn record_stock_count(
        &self,
        lot_id: LotId,
        remaining: Decimal,
        unit_cost: Option<Decimal>,
    ) -> Result<InventoryLot, InventoryError> {
        if remaining.is_negative() {
            return Err(InventoryError::InvalidQuantity(format!(
                "remaining quantity must not be negative, got {remaining}"
            )));
        }
        if let Some(cost) = unit_cost {
            if cost.is_negative() {
                return Err(InventoryError::InvalidQuantity(format!(
                    "unit cost must not be negative, got {cost}"
                )));
            }
        }

        let now = self.clock.now();
        let mut tx = self.repo.begin().await?;
        if !lots::update_lot_stock(&mut *tx, lot_id, remaining, unit_cost, now).await? {
            return Err(InventoryError::LotNotFound(lot_id));
        }
        let lot = lots::fetch_lot(&mut *tx, lot_id)
            .await?
            .ok_or(InventoryError::LotNotFound(lot_id))?;
        if lot.remaining_qty > lot.original_qty {
            return Err(InventoryError::InvalidQuantity(format!(
                "remaining quantity {} exceeds the original quantity {} of lot {}",
                remaining, lot.original_qty, lot_id
            )));
        }
        tx.commit().await?;

        tracing::info!(
            lot_id = %lot_id,
            remaining = %lot.remaining_qty,
            unit_cost = %lot.unit_cost,
            "Stock count recorded"
        );
        Ok(lot)
    }

    pub async fn get_lot(&self, lot_id: LotId) -> Result<InventoryLot, InventoryError> {
        self.repo
            .get_lot(lot_id)
            .await?
            .ok_or(InventoryError::LotNotFound(lot_id))
    }
}

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("lot {0} not found")]
    LotNotFound(LotId),
    #[error("{0}")]
    InvalidQuantity(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}
