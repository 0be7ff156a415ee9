use crate::domain::{Decimal, OrderLineItem};

/// The three totals persisted on an order after every line-item change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrderTotals {
    /// Σ price_original × qty.
    pub total: Decimal,
    /// Σ (price_original − price_snapshot) × qty.
    pub discount: Decimal,
    /// `total − discount`.
    pub final_total: Decimal,
}

impl OrderTotals {
    /// Recompute from scratch over the current line items.
    pub fn from_items(items: &[OrderLineItem]) -> Self {
        let mut total = Decimal::zero();
        let mut discount = Decimal::zero();

        for item in items {
            let qty = Decimal::from(item.qty);
            total += item.price_original * qty;
            discount += (item.price_original - item.price_snapshot) * qty;
        }

        Self {
            total,
            discount,
            final_total: total - discount,
        }
    }

    /// Totals at completion: the manual discount stacks on the promotional one.
    pub fn with_manual_discount(self, manual_discount: Decimal) -> Self {
        let discount = self.discount + manual_discount;
        Self {
            total: self.total,
            discount,
            final_total: self.total - discount,
        }
    }
}
