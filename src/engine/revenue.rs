use crate::domain::{
    Decimal, OrderId, OrderSummary, OrderSummaryLine, PaymentId, ProductId, ProductRevenue,
    RevenueDetails, TimeMs,
};
use std::collections::HashMap;

use super::UNKNOWN_LABEL;

/// A completed sale as read from the payment ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleRecord {
    pub payment_id: PaymentId,
    pub amount: Decimal,
    pub paid_at_ms: TimeMs,
    /// `None` if the payment's order can no longer be resolved.
    pub order: Option<SaleOrder>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleOrder {
    pub order_id: OrderId,
    pub daily_seq: i64,
    pub table_name: Option<String>,
    pub customer_name: Option<String>,
    pub lines: Vec<SaleLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleLine {
    pub product_id: ProductId,
    pub product_name: Option<String>,
    pub qty: i64,
    /// Price actually charged per unit.
    pub unit_price: Decimal,
}

/// Labels used when an order has no table or customer attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderLabels {
    pub takeaway: String,
    pub walk_in: String,
}

impl Default for PlaceholderLabels {
    fn default() -> Self {
        Self {
            takeaway: "Takeaway".to_string(),
            walk_in: "Walk-in customer".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevenueAggregation {
    pub total_revenue: Decimal,
    pub details: RevenueDetails,
}

/// Folds the sales of one window into totals, per-order summaries and
/// per-product aggregates.
pub struct RevenueAggregator {
    labels: PlaceholderLabels,
}

impl RevenueAggregator {
    pub fn new(labels: PlaceholderLabels) -> Self {
        Self { labels }
    }

    pub fn aggregate(&self, sales: &[SaleRecord]) -> RevenueAggregation {
        let mut total_revenue = Decimal::zero();
        let mut orders = Vec::new();
        let mut products: Vec<ProductRevenue> = Vec::new();
        let mut product_index: HashMap<ProductId, usize> = HashMap::new();

        for sale in sales {
            // Revenue is the payment amount, which already nets out discounts.
            total_revenue += sale.amount;

            let Some(order) = &sale.order else {
                continue;
            };

            let mut items = Vec::with_capacity(order.lines.len());
            for line in &order.lines {
                let line_total = line.unit_price * Decimal::from(line.qty);
                let product_name = line
                    .product_name
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_LABEL.to_string());

                match product_index.get(&line.product_id) {
                    Some(&idx) => {
                        let aggregate = &mut products[idx];
                        aggregate.qty += line.qty;
                        aggregate.total += line_total;
                    }
                    None => {
                        product_index.insert(line.product_id, products.len());
                        products.push(ProductRevenue {
                            product_id: line.product_id,
                            product_name: product_name.clone(),
                            qty: line.qty,
                            total: line_total,
                        });
                    }
                }

                items.push(OrderSummaryLine {
                    product_id: line.product_id,
                    product_name,
                    qty: line.qty,
                    unit_price: line.unit_price,
                    total: line_total,
                });
            }

            orders.push(OrderSummary {
                order_id: order.order_id,
                daily_seq: order.daily_seq,
                table_name: order
                    .table_name
                    .clone()
                    .unwrap_or_else(|| self.labels.takeaway.clone()),
                customer_name: order
                    .customer_name
                    .clone()
                    .unwrap_or_else(|| self.labels.walk_in.clone()),
                total: sale.amount,
                paid_at_ms: sale.paid_at_ms,
                items,
            });
        }

        // Stable sorts keep ledger order among equal keys.
        orders.sort_by(|a, b| b.paid_at_ms.cmp(&a.paid_at_ms));
        products.sort_by(|a, b| b.total.cmp(&a.total));

        RevenueAggregation {
            total_revenue,
            details: RevenueDetails {
                total_orders: orders.len(),
                items: products,
                orders,
            },
        }
    }
}

impl Default for RevenueAggregator {
    fn default() -> Self {
        Self::new(PlaceholderLabels::default())
    }
}
