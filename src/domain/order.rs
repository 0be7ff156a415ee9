//! Orders, line items, payments and the catalog entries they reference.

use crate::domain::{Decimal, LineItemId, OrderId, PaymentId, ProductId, TableId, TimeMs};
use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// ```text
///    ┌──────────────────────┐
///    │                      ▼
/// pending ──► served ──► completed
///    │           │
///    └───────────┴─────► cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Served,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Served => "served",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "served" => Some(OrderStatus::Served),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Completed and cancelled orders accept no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Served)
                | (OrderStatus::Pending, OrderStatus::Completed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Served, OrderStatus::Completed)
                | (OrderStatus::Served, OrderStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineItem {
    pub id: LineItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: Option<String>,
    pub qty: i64,
    /// Price actually charged per unit (promotional price when one applied).
    pub price_snapshot: Decimal,
    /// List price per unit when the line was created.
    pub price_original: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub amount: Decimal,
    pub created_at_ms: TimeMs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub table_id: Option<TableId>,
    pub table_name: Option<String>,
    pub customer_name: Option<String>,
    pub guest_count: i64,
    pub daily_seq: i64,
    pub status: OrderStatus,
    /// Merchandise total at list prices.
    pub total: Decimal,
    /// Promotional discount, plus the manual discount once completed.
    pub discount: Decimal,
    pub final_total: Decimal,
    pub created_at_ms: TimeMs,
    pub items: Vec<OrderLineItem>,
    pub payment: Option<Payment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub promo_price: Option<Decimal>,
}

impl Product {
    /// Price to charge right now: the promotional price when set, else list.
    pub fn effective_price(&self) -> Decimal {
        self.promo_price.unwrap_or(self.price)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
    Available,
    Occupied,
}

impl TableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableStatus::Available => "available",
            TableStatus::Occupied => "occupied",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(TableStatus::Available),
            "occupied" => Some(TableStatus::Occupied),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiningTable {
    pub id: TableId,
    pub name: String,
    pub status: TableStatus,
}
