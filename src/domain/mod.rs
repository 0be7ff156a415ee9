//! Domain types for the cafe ledger.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Primitives: TimeMs and typed row identifiers
//! - Inventory lots, orders and payments, and the profit cycle record

pub mod cycle;
pub mod decimal;
pub mod lot;
pub mod order;
pub mod primitives;

pub use cycle::{
    CostDetail, CostDetails, CycleStatus, NewProfitCycle, OrderSummary, OrderSummaryLine,
    ProductRevenue, ProfitCycle, RevenueDetails, SnapshotEntry,
};
pub use decimal::Decimal;
pub use lot::{Ingredient, InventoryLot, PurchaseLine, PurchaseOrder};
pub use order::{
    DiningTable, Order, OrderLineItem, OrderStatus, Payment, Product, TableStatus,
};
pub use primitives::{
    CycleId, IngredientId, LineItemId, LotId, OrderId, PaymentId, ProductId, PurchaseOrderId,
    TableId, TimeMs,
};
