use crate::domain::{CostDetail, CostDetails, Decimal, InventoryLot, LotId, SnapshotEntry};
use std::collections::HashMap;

use super::UNKNOWN_LABEL;

/// Result of attributing consumption to the current lots.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CostAttribution {
    pub total_cost: Decimal,
    /// Only lots with positive consumption, highest line cost first.
    pub details: CostDetails,
    /// Remaining quantity of every current lot, consumed or not.
    pub snapshot: Vec<SnapshotEntry>,
}

/// Infers per-lot consumption from the remaining quantity recorded at the
/// previous close.
///
/// A lot found in the prior snapshot is measured from the snapshot value.
/// A lot missing from it (first cycle, or bought after the last close) is
/// measured from its original quantity.
pub struct CostAttributor {
    prior: HashMap<LotId, Decimal>,
}

impl CostAttributor {
    /// Build an attributor from the previous cycle's snapshot, or `None` when
    /// no cycle exists yet.
    pub fn new(prior_snapshot: Option<&[SnapshotEntry]>) -> Self {
        let prior = prior_snapshot
            .unwrap_or_default()
            .iter()
            .map(|entry| (entry.lot_id, entry.remaining_qty))
            .collect();
        Self { prior }
    }

    /// True when there is no baseline at all and every lot bootstraps from
    /// its original quantity.
    pub fn is_first_cycle(&self) -> bool {
        self.prior.is_empty()
    }

    /// Quantity the lot held at the start of the cycle.
    pub fn baseline_for(&self, lot: &InventoryLot) -> Decimal {
        self.prior
            .get(&lot.id)
            .copied()
            .unwrap_or(lot.original_qty)
    }

    pub fn attribute(&self, lots: &[InventoryLot]) -> CostAttribution {
        let mut total_cost = Decimal::zero();
        let mut items = Vec::new();
        let mut snapshot = Vec::with_capacity(lots.len());

        for lot in lots {
            let current_remaining = lot.remaining_qty;
            snapshot.push(SnapshotEntry {
                lot_id: lot.id,
                purchase_order_id: lot.purchase_order_id,
                ingredient_id: lot.ingredient_id,
                remaining_qty: current_remaining,
            });

            let previous_remaining = self.baseline_for(lot);
            let consumed = previous_remaining - current_remaining;
            // An upward stock correction is not negative consumption.
            if !consumed.is_positive() {
                continue;
            }

            let line_cost = consumed * lot.unit_cost;
            total_cost += line_cost;
            items.push(CostDetail {
                lot_id: lot.id,
                purchase_order_id: lot.purchase_order_id,
                ingredient_id: lot.ingredient_id,
                ingredient_name: lot
                    .ingredient_name
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
                purchased_at_ms: lot.purchased_at_ms,
                previous_remaining,
                current_remaining,
                consumed_qty: consumed,
                unit_cost: lot.unit_cost,
                line_cost,
            });
        }

        items.sort_by(|a, b| {
            b.line_cost
                .cmp(&a.line_cost)
                .then_with(|| a.lot_id.cmp(&b.lot_id))
        });

        CostAttribution {
            total_cost,
            details: CostDetails { items },
            snapshot,
        }
    }
}
