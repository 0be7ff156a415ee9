//! Profit cycle record and its persisted breakdowns.
//!
//! Field names are camelCase on the wire and inside the JSON breakdown
//! columns, so a stored cycle reads back exactly as it was returned by the
//! close that produced it.

use crate::domain::{
    CycleId, Decimal, IngredientId, LotId, OrderId, ProductId, PurchaseOrderId, TimeMs,
};
use serde::{Deserialize, Serialize};

/// Cycle status. Every cycle is created already closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleStatus {
    Closed,
}

impl CycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "closed" => Some(CycleStatus::Closed),
            _ => None,
        }
    }
}

/// Remaining quantity of one lot at the moment a cycle closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub lot_id: LotId,
    pub purchase_order_id: PurchaseOrderId,
    pub ingredient_id: IngredientId,
    pub remaining_qty: Decimal,
}

/// Per-product revenue accumulated over every order in the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRevenue {
    pub product_id: ProductId,
    pub product_name: String,
    pub qty: i64,
    pub total: Decimal,
}

/// One line of a paid order as it was charged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummaryLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub qty: i64,
    pub unit_price: Decimal,
    pub total: Decimal,
}

/// A paid order inside the revenue window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub daily_seq: i64,
    pub table_name: String,
    pub customer_name: String,
    pub total: Decimal,
    pub paid_at_ms: TimeMs,
    pub items: Vec<OrderSummaryLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueDetails {
    pub total_orders: usize,
    /// Sorted by `total` descending.
    pub items: Vec<ProductRevenue>,
    /// Newest payment first.
    pub orders: Vec<OrderSummary>,
}

/// Cost of what one lot lost since the previous close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostDetail {
    pub lot_id: LotId,
    pub purchase_order_id: PurchaseOrderId,
    pub ingredient_id: IngredientId,
    pub ingredient_name: String,
    pub purchased_at_ms: TimeMs,
    pub previous_remaining: Decimal,
    pub current_remaining: Decimal,
    pub consumed_qty: Decimal,
    pub unit_cost: Decimal,
    pub line_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostDetails {
    /// Sorted by `line_cost` descending.
    pub items: Vec<CostDetail>,
}

/// A closed accounting period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitCycle {
    pub id: CycleId,
    pub start_ms: TimeMs,
    pub end_ms: TimeMs,
    pub status: CycleStatus,
    pub revenue: Decimal,
    pub cost: Decimal,
    /// `revenue - cost`; may be negative.
    pub profit: Decimal,
    pub revenue_details: RevenueDetails,
    pub cost_details: CostDetails,
    pub inventory_snapshot: Vec<SnapshotEntry>,
    pub created_at_ms: TimeMs,
}

/// A cycle that has been computed but not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfitCycle {
    pub start_ms: TimeMs,
    pub end_ms: TimeMs,
    pub revenue: Decimal,
    pub cost: Decimal,
    pub profit: Decimal,
    pub revenue_details: RevenueDetails,
    pub cost_details: CostDetails,
    pub inventory_snapshot: Vec<SnapshotEntry>,
}

impl NewProfitCycle {
    pub fn into_cycle(self, id: CycleId, created_at_ms: TimeMs) -> ProfitCycle {
        ProfitCycle {
            id,
            start_ms: self.start_ms,
            end_ms: self.end_ms,
            status: CycleStatus::Closed,
            revenue: self.revenue,
            cost: self.cost,
            profit: self.profit,
            revenue_details: self.revenue_details,
            cost_details: self.cost_details,
            inventory_snapshot: self.inventory_snapshot,
            created_at_ms,
        }
    }
}
