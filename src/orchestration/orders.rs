//! Order lifecycle: creation, line-item changes, serving, completion and
//! cancellation.
//!
//! Every mutation runs in one transaction whose first statement writes the
//! order (or table) row, so SQLite's write lock is held before anything is
//! read. Dropping the transaction on an error rolls back every effect.

use crate::clock::Clock;
use crate::db::repo::{catalog, cycles, orders};
use crate::db::Repository;
use crate::domain::{
    Decimal, LineItemId, Order, OrderId, OrderStatus, ProductId, TableId, TableStatus, TimeMs,
};
use crate::engine::OrderTotals;
use sqlx::sqlite::SqliteConnection;
use std::sync::Arc;
use thiserror::Error;

/// Input for [`OrderService::create_order`].
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub table_id: Option<TableId>,
    pub customer_name: Option<String>,
    pub guest_count: Option<i64>,
}

#[derive(Clone)]
pub struct OrderService {
    repo: Arc<Repository>,
    clock: Arc<dyn Clock>,
}

impl OrderService {
    pub fn new(repo: Arc<Repository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Open a pending order, optionally seating it at a table.
    ///
    /// # Errors
    /// `TableNotFound`, or `TableOccupied` if the table already holds a
    /// pending or served order.
    pub async fn create_order(&self, input: NewOrder) -> Result<Order, OrderError> {
        let guest_count = input.guest_count.unwrap_or(1);
        if guest_count < 1 {
            return Err(OrderError::BadRequest(format!(
                "guest count must be at least 1, got {guest_count}"
            )));
        }

        let now = self.clock.now();
        let mut tx = self.repo.begin().await?;

        let table = match input.table_id {
            Some(table_id) => {
                if !catalog::claim_table(&mut *tx, table_id).await? {
                    return Err(OrderError::TableNotFound(table_id));
                }
                catalog::fetch_table(&mut *tx, table_id).await?
            }
            None => None,
        };

        let order_id = orders::insert_order(
            &mut *tx,
            table.as_ref(),
            input.customer_name.as_deref(),
            guest_count,
            now.utc_day_start(),
            now,
        )
        .await?;

        if let Some(table_id) = input.table_id {
            if orders::find_other_open_order_for_table(&mut *tx, table_id, order_id)
                .await?
                .is_some()
            {
                return Err(OrderError::TableOccupied(table_id));
            }
        }

        let order = load_order(&mut *tx, order_id).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            daily_seq = order.daily_seq,
            table_id = ?order.table_id,
            "Order created"
        );
        Ok(order)
    }

    /// Add `qty` of a product. An existing line for the product is
    /// incremented, otherwise a new line captures the current prices.
    pub async fn add_line_item(
        &self,
        order_id: OrderId,
        product_id: ProductId,
        qty: i64,
    ) -> Result<Order, OrderError> {
        if qty < 1 {
            return Err(OrderError::InvalidQuantity(format!(
                "quantity to add must be at least 1, got {qty}"
            )));
        }

        let now = self.clock.now();
        let mut tx = self.repo.begin().await?;
        let status = touch_and_status(&mut *tx, order_id, now).await?;
        ensure_open(order_id, status)?;

        let product = catalog::fetch_product(&mut *tx, product_id)
            .await?
            .ok_or(OrderError::ProductNotFound(product_id))?;

        match orders::find_line_item_for_product(&mut *tx, order_id, product_id).await? {
            Some(existing) => {
                orders::update_line_item_qty(&mut *tx, existing.id, existing.qty + qty).await?;
            }
            None => {
                orders::insert_line_item(
                    &mut *tx,
                    order_id,
                    product_id,
                    qty,
                    product.effective_price(),
                    product.price,
                    now,
                )
                .await?;
            }
        }

        let order = recompute_totals(&mut *tx, order_id, now).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            product_id = %product_id,
            qty,
            final_total = %order.final_total,
            "Line item added"
        );
        Ok(order)
    }

    /// Set a line item's quantity. Zero or less removes the line.
    pub async fn set_line_item_qty(
        &self,
        item_id: LineItemId,
        qty: i64,
    ) -> Result<Order, OrderError> {
        let now = self.clock.now();
        let mut tx = self.repo.begin().await?;

        if !orders::touch_order_of_line_item(&mut *tx, item_id, now).await? {
            return Err(OrderError::LineItemNotFound(item_id));
        }
        let item = orders::fetch_line_item(&mut *tx, item_id)
            .await?
            .ok_or(OrderError::LineItemNotFound(item_id))?;
        let (status, _) = orders::fetch_order_status(&mut *tx, item.order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(item.order_id))?;
        ensure_open(item.order_id, status)?;

        if qty <= 0 {
            orders::delete_line_item(&mut *tx, item_id).await?;
        } else {
            orders::update_line_item_qty(&mut *tx, item_id, qty).await?;
        }

        let order = recompute_totals(&mut *tx, item.order_id, now).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %item.order_id,
            line_item_id = %item_id,
            qty,
            final_total = %order.final_total,
            "Line item quantity set"
        );
        Ok(order)
    }

    /// pending -> served.
    pub async fn mark_served(&self, order_id: OrderId) -> Result<Order, OrderError> {
        let now = self.clock.now();
        let mut tx = self.repo.begin().await?;
        let status = touch_and_status(&mut *tx, order_id, now).await?;
        ensure_transition(order_id, status, OrderStatus::Served)?;

        orders::update_order_status(&mut *tx, order_id, OrderStatus::Served, now).await?;
        let order = load_order(&mut *tx, order_id).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order_id, "Order served");
        Ok(order)
    }

    /// Complete the order and record its payment.
    ///
    /// The manual discount stacks on the promotional discount already on the
    /// order. The payment is timestamped strictly after the last profit cycle
    /// close so it always lands in a window that has not been closed yet.
    pub async fn complete(
        &self,
        order_id: OrderId,
        manual_discount: Decimal,
    ) -> Result<Order, OrderError> {
        if manual_discount.is_negative() {
            return Err(OrderError::BadRequest(format!(
                "discount must not be negative, got {manual_discount}"
            )));
        }

        let now = self.clock.now();
        let mut tx = self.repo.begin().await?;
        let status = touch_and_status(&mut *tx, order_id, now).await?;
        ensure_transition(order_id, status, OrderStatus::Completed)?;

        let items = orders::fetch_order_items(&mut *tx, order_id).await?;
        let totals = OrderTotals::from_items(&items).with_manual_discount(manual_discount);
        if totals.final_total.is_negative() {
            return Err(OrderError::BadRequest(format!(
                "discount {manual_discount} exceeds the order total"
            )));
        }

        orders::update_order_totals(&mut *tx, order_id, &totals, now).await?;
        orders::update_order_status(&mut *tx, order_id, OrderStatus::Completed, now).await?;

        let watermark = cycles::close_watermark(&mut *tx).await?;
        let paid_at = now.max(TimeMs::new(watermark.as_i64() + 1));
        let payment =
            orders::insert_payment(&mut *tx, order_id, totals.final_total, paid_at).await?;

        let order = load_order(&mut *tx, order_id).await?;
        release_table(&mut *tx, order.table_id).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            payment_id = %payment.id,
            amount = %payment.amount,
            paid_at_ms = paid_at.as_i64(),
            "Order completed"
        );
        Ok(order)
    }

    /// Cancel the order. No payment is recorded.
    pub async fn cancel(&self, order_id: OrderId) -> Result<Order, OrderError> {
        let now = self.clock.now();
        let mut tx = self.repo.begin().await?;
        let status = touch_and_status(&mut *tx, order_id, now).await?;
        ensure_transition(order_id, status, OrderStatus::Cancelled)?;

        orders::update_order_status(&mut *tx, order_id, OrderStatus::Cancelled, now).await?;
        let order = load_order(&mut *tx, order_id).await?;
        release_table(&mut *tx, order.table_id).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order_id, "Order cancelled");
        Ok(order)
    }

    pub async fn get(&self, order_id: OrderId) -> Result<Order, OrderError> {
        self.repo
            .get_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    /// Open orders plus everything created today (UTC), unpaid first.
    pub async fn list_today(&self) -> Result<Vec<Order>, OrderError> {
        let day_start = self.clock.now().utc_day_start();
        Ok(self.repo.list_today_orders(day_start).await?)
    }
}

async fn touch_and_status(
    conn: &mut SqliteConnection,
    order_id: OrderId,
    now: TimeMs,
) -> Result<OrderStatus, OrderError> {
    if !orders::touch_order(conn, order_id, now).await? {
        return Err(OrderError::OrderNotFound(order_id));
    }
    let (status, _) = orders::fetch_order_status(conn, order_id)
        .await?
        .ok_or(OrderError::OrderNotFound(order_id))?;
    Ok(status)
}

async fn load_order(conn: &mut SqliteConnection, order_id: OrderId) -> Result<Order, OrderError> {
    orders::fetch_order(conn, order_id)
        .await?
        .ok_or(OrderError::OrderNotFound(order_id))
}

async fn recompute_totals(
    conn: &mut SqliteConnection,
    order_id: OrderId,
    now: TimeMs,
) -> Result<Order, OrderError> {
    let items = orders::fetch_order_items(conn, order_id).await?;
    let totals = OrderTotals::from_items(&items);
    orders::update_order_totals(conn, order_id, &totals, now).await?;
    load_order(conn, order_id).await
}

async fn release_table(
    conn: &mut SqliteConnection,
    table_id: Option<TableId>,
) -> Result<(), OrderError> {
    if let Some(table_id) = table_id {
        catalog::set_table_status(conn, table_id, TableStatus::Available).await?;
    }
    Ok(())
}

fn ensure_open(order_id: OrderId, status: OrderStatus) -> Result<(), OrderError> {
    if status.is_terminal() {
        return Err(OrderError::InvalidTransition {
            order_id,
            from: status,
            action: "modify items of",
        });
    }
    Ok(())
}

fn ensure_transition(
    order_id: OrderId,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<(), OrderError> {
    if !from.can_transition_to(to) {
        return Err(OrderError::InvalidTransition {
            order_id,
            from,
            action: match to {
                OrderStatus::Served => "serve",
                OrderStatus::Completed => "complete",
                OrderStatus::Cancelled => "cancel",
                OrderStatus::Pending => "reopen",
            },
        });
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order {0} not found")]
    OrderNotFound(OrderId),
    #[error("line item {0} not found")]
    LineItemNotFound(LineItemId),
    #[error("product {0} not found")]
    ProductNotFound(ProductId),
    #[error("table {0} not found")]
    TableNotFound(TableId),
    #[error("table {0} already has an open order")]
    TableOccupied(TableId),
    #[error("cannot {action} order {order_id} in status {from}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderStatus,
        action: &'static str,
    },
    #[error("{0}")]
    InvalidQuantity(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("transaction aborted: {0}")]
    TransactionAborted(#[from] sqlx::Error),
}
