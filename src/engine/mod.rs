//! Pure computation engines for cycle accounting and order totals.
//!
//! Nothing here touches the database; orchestration feeds these with rows
//! read inside a transaction and persists what they return.

pub mod cost_attribution;
pub mod order_totals;
pub mod revenue;

pub use cost_attribution::{CostAttribution, CostAttributor};
pub use order_totals::OrderTotals;
pub use revenue::{
    PlaceholderLabels, RevenueAggregation, RevenueAggregator, SaleLine, SaleOrder, SaleRecord,
};

/// Label for a product or ingredient reference that no longer resolves.
pub const UNKNOWN_LABEL: &str = "Unknown";
