//! Inventory lots and the purchase orders that create them.

use crate::domain::{Decimal, IngredientId, LotId, PurchaseOrderId, TimeMs};
use serde::{Deserialize, Serialize};

/// A purchased batch of one ingredient.
///
/// `remaining_qty` is maintained by stock counts, never by sales; consumption
/// is inferred from how it moves between cycle closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLot {
    pub id: LotId,
    pub purchase_order_id: PurchaseOrderId,
    pub ingredient_id: IngredientId,
    /// Resolved through the ingredient registry; `None` if it no longer resolves.
    pub ingredient_name: Option<String>,
    pub original_qty: Decimal,
    pub remaining_qty: Decimal,
    pub unit_cost: Decimal,
    /// When the owning purchase order says the goods were bought.
    pub purchased_at_ms: TimeMs,
    pub created_at_ms: TimeMs,
}

/// One line of a purchase being recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseLine {
    pub ingredient_id: IngredientId,
    pub qty: Decimal,
    pub unit_cost: Decimal,
}

/// A recorded purchase order together with the lots it created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub supplier: Option<String>,
    pub purchased_at_ms: TimeMs,
    pub lots: Vec<InventoryLot>,
}

/// Raw ingredient a lot refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
    pub unit: Option<String>,
}
