//! Orders, line items, payments and the sales ledger reads that feed revenue.

use crate::domain::{
    Decimal, DiningTable, LineItemId, Order, OrderId, OrderLineItem, OrderStatus, Payment,
    PaymentId, ProductId, TableId, TimeMs,
};
use crate::engine::{OrderTotals, SaleLine, SaleOrder, SaleRecord};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use std::collections::HashMap;

use super::{decimal_col, Repository};

const ORDER_SELECT: &str = r#"
    SELECT id, table_id, table_name, customer_name, guest_count, daily_seq, status,
           total, discount, final_total, created_at_ms
    FROM orders
"#;

const ITEM_SELECT: &str = r#"
    SELECT oi.id, oi.order_id, oi.product_id, p.name AS product_name, oi.qty,
           oi.price_snapshot, oi.price_original
    FROM order_items oi
    LEFT JOIN products p ON p.id = oi.product_id
"#;

const PAYMENT_SELECT: &str = "SELECT id, order_id, amount, created_at_ms FROM payments";

fn order_status_col(row: &SqliteRow) -> Result<OrderStatus, sqlx::Error> {
    let status: String = row.try_get("status")?;
    OrderStatus::parse(&status).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: "status".to_string(),
        source: format!("unknown order status {:?}", status).into(),
    })
}

fn order_from_row(
    row: &SqliteRow,
    items: Vec<OrderLineItem>,
    payment: Option<Payment>,
) -> Result<Order, sqlx::Error> {
    let table_id: Option<i64> = row.try_get("table_id")?;
    Ok(Order {
        id: OrderId::new(row.try_get("id")?),
        table_id: table_id.map(TableId::new),
        table_name: row.try_get("table_name")?,
        customer_name: row.try_get("customer_name")?,
        guest_count: row.try_get("guest_count")?,
        daily_seq: row.try_get("daily_seq")?,
        status: order_status_col(row)?,
        total: decimal_col(row, "total")?,
        discount: decimal_col(row, "discount")?,
        final_total: decimal_col(row, "final_total")?,
        created_at_ms: TimeMs::new(row.try_get("created_at_ms")?),
        items,
        payment,
    })
}

fn item_from_row(row: &SqliteRow) -> Result<OrderLineItem, sqlx::Error> {
    Ok(OrderLineItem {
        id: LineItemId::new(row.try_get("id")?),
        order_id: OrderId::new(row.try_get("order_id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        product_name: row.try_get("product_name")?,
        qty: row.try_get("qty")?,
        price_snapshot: decimal_col(row, "price_snapshot")?,
        price_original: decimal_col(row, "price_original")?,
    })
}

fn payment_from_row(row: &SqliteRow) -> Result<Payment, sqlx::Error> {
    Ok(Payment {
        id: PaymentId::new(row.try_get("id")?),
        order_id: OrderId::new(row.try_get("order_id")?),
        amount: decimal_col(row, "amount")?,
        created_at_ms: TimeMs::new(row.try_get("created_at_ms")?),
    })
}

// =============================================================================
// Orders
// =============================================================================

/// Insert a pending order. The daily sequence is assigned in the same
/// statement as 1 + the highest sequence created since `day_start`.
pub async fn insert_order(
    conn: &mut SqliteConnection,
    table: Option<&DiningTable>,
    customer_name: Option<&str>,
    guest_count: i64,
    day_start: TimeMs,
    now: TimeMs,
) -> Result<OrderId, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO orders (
            table_id, table_name, customer_name, guest_count, daily_seq, status,
            total, discount, final_total, created_at_ms, updated_at_ms
        ) VALUES (
            ?, ?, ?, ?,
            (SELECT COALESCE(MAX(daily_seq), 0) + 1 FROM orders WHERE created_at_ms >= ?),
            'pending', '0', '0', '0', ?, ?
        )
        "#,
    )
    .bind(table.map(|t| t.id.as_i64()))
    .bind(table.map(|t| t.name.as_str()))
    .bind(customer_name)
    .bind(guest_count)
    .bind(day_start.as_i64())
    .bind(now.as_i64())
    .bind(now.as_i64())
    .execute(&mut *conn)
    .await?;

    Ok(OrderId::new(result.last_insert_rowid()))
}

/// Write to the order row so the transaction holds SQLite's write lock before
/// anything is read. Returns false if the order does not exist.
pub async fn touch_order(
    conn: &mut SqliteConnection,
    id: OrderId,
    now: TimeMs,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE orders SET updated_at_ms = ? WHERE id = ?")
        .bind(now.as_i64())
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Touch the order owning a line item. Returns false if the item does not
/// exist.
pub async fn touch_order_of_line_item(
    conn: &mut SqliteConnection,
    item_id: LineItemId,
    now: TimeMs,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET updated_at_ms = ?
        WHERE id = (SELECT order_id FROM order_items WHERE id = ?)
        "#,
    )
    .bind(now.as_i64())
    .bind(item_id.as_i64())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_order(
    conn: &mut SqliteConnection,
    id: OrderId,
) -> Result<Option<Order>, sqlx::Error> {
    let sql = format!("{ORDER_SELECT} WHERE id = ?");
    let Some(row) = sqlx::query(&sql)
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let items = fetch_order_items(conn, id).await?;
    let payment = fetch_payment_for_order(conn, id).await?;
    order_from_row(&row, items, payment).map(Some)
}

/// Current status, without loading items.
pub async fn fetch_order_status(
    conn: &mut SqliteConnection,
    id: OrderId,
) -> Result<Option<(OrderStatus, Option<TableId>)>, sqlx::Error> {
    let row = sqlx::query("SELECT status, table_id FROM orders WHERE id = ?")
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;
    row.map(|r| {
        let table_id: Option<i64> = r.try_get("table_id")?;
        Ok((order_status_col(&r)?, table_id.map(TableId::new)))
    })
    .transpose()
}

pub async fn update_order_totals(
    conn: &mut SqliteConnection,
    id: OrderId,
    totals: &OrderTotals,
    now: TimeMs,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE orders
        SET total = ?, discount = ?, final_total = ?, updated_at_ms = ?
        WHERE id = ?
        "#,
    )
    .bind(totals.total.to_canonical_string())
    .bind(totals.discount.to_canonical_string())
    .bind(totals.final_total.to_canonical_string())
    .bind(now.as_i64())
    .bind(id.as_i64())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn update_order_status(
    conn: &mut SqliteConnection,
    id: OrderId,
    status: OrderStatus,
    now: TimeMs,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET status = ?, updated_at_ms = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(now.as_i64())
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// A pending or served order other than `except` holding the table.
pub async fn find_other_open_order_for_table(
    conn: &mut SqliteConnection,
    table_id: TableId,
    except: OrderId,
) -> Result<Option<OrderId>, sqlx::Error> {
    let id: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT id FROM orders
        WHERE table_id = ? AND id <> ? AND status IN ('pending', 'served')
        ORDER BY id ASC
        LIMIT 1
        "#,
    )
    .bind(table_id.as_i64())
    .bind(except.as_i64())
    .fetch_optional(&mut *conn)
    .await?;
    Ok(id.map(OrderId::new))
}

// =============================================================================
// Line items
// =============================================================================

pub async fn fetch_order_items(
    conn: &mut SqliteConnection,
    order_id: OrderId,
) -> Result<Vec<OrderLineItem>, sqlx::Error> {
    let sql = format!("{ITEM_SELECT} WHERE oi.order_id = ? ORDER BY oi.id ASC");
    let rows = sqlx::query(&sql)
        .bind(order_id.as_i64())
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(item_from_row).collect()
}

pub async fn fetch_line_item(
    conn: &mut SqliteConnection,
    id: LineItemId,
) -> Result<Option<OrderLineItem>, sqlx::Error> {
    let sql = format!("{ITEM_SELECT} WHERE oi.id = ?");
    let row = sqlx::query(&sql)
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(item_from_row).transpose()
}

pub async fn find_line_item_for_product(
    conn: &mut SqliteConnection,
    order_id: OrderId,
    product_id: ProductId,
) -> Result<Option<OrderLineItem>, sqlx::Error> {
    let sql = format!("{ITEM_SELECT} WHERE oi.order_id = ? AND oi.product_id = ?");
    let row = sqlx::query(&sql)
        .bind(order_id.as_i64())
        .bind(product_id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(item_from_row).transpose()
}

pub async fn insert_line_item(
    conn: &mut SqliteConnection,
    order_id: OrderId,
    product_id: ProductId,
    qty: i64,
    price_snapshot: Decimal,
    price_original: Decimal,
    now: TimeMs,
) -> Result<LineItemId, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO order_items (
            order_id, product_id, qty, price_snapshot, price_original, created_at_ms
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(order_id.as_i64())
    .bind(product_id.as_i64())
    .bind(qty)
    .bind(price_snapshot.to_canonical_string())
    .bind(price_original.to_canonical_string())
    .bind(now.as_i64())
    .execute(&mut *conn)
    .await?;

    Ok(LineItemId::new(result.last_insert_rowid()))
}

pub async fn update_line_item_qty(
    conn: &mut SqliteConnection,
    id: LineItemId,
    qty: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE order_items SET qty = ? WHERE id = ?")
        .bind(qty)
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn delete_line_item(conn: &mut SqliteConnection, id: LineItemId) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM order_items WHERE id = ?")
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

// =============================================================================
// Payments
// =============================================================================

pub async fn insert_payment(
    conn: &mut SqliteConnection,
    order_id: OrderId,
    amount: Decimal,
    paid_at: TimeMs,
) -> Result<Payment, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO payments (order_id, amount, created_at_ms) VALUES (?, ?, ?)",
    )
    .bind(order_id.as_i64())
    .bind(amount.to_canonical_string())
    .bind(paid_at.as_i64())
    .execute(&mut *conn)
    .await?;

    Ok(Payment {
        id: PaymentId::new(result.last_insert_rowid()),
        order_id,
        amount,
        created_at_ms: paid_at,
    })
}

pub async fn fetch_payment_for_order(
    conn: &mut SqliteConnection,
    order_id: OrderId,
) -> Result<Option<Payment>, sqlx::Error> {
    let sql = format!("{PAYMENT_SELECT} WHERE order_id = ?");
    let row = sqlx::query(&sql)
        .bind(order_id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(payment_from_row).transpose()
}

/// Every sale paid in `(start, end]`, newest payment first, with the lines
/// charged on each order.
pub async fn fetch_sales_in_window(
    conn: &mut SqliteConnection,
    start_exclusive: TimeMs,
    end_inclusive: TimeMs,
) -> Result<Vec<SaleRecord>, sqlx::Error> {
    let payment_rows = sqlx::query(
        r#"
        SELECT p.id AS payment_id, p.amount, p.created_at_ms AS paid_at_ms,
               o.id AS order_id, o.daily_seq, o.table_name, o.customer_name
        FROM payments p
        LEFT JOIN orders o ON o.id = p.order_id
        WHERE p.created_at_ms > ? AND p.created_at_ms <= ?
        ORDER BY p.created_at_ms DESC, p.id DESC
        "#,
    )
    .bind(start_exclusive.as_i64())
    .bind(end_inclusive.as_i64())
    .fetch_all(&mut *conn)
    .await?;

    let line_rows = sqlx::query(
        r#"
        SELECT oi.order_id, oi.product_id, pr.name AS product_name, oi.qty, oi.price_snapshot
        FROM order_items oi
        JOIN payments p ON p.order_id = oi.order_id
        LEFT JOIN products pr ON pr.id = oi.product_id
        WHERE p.created_at_ms > ? AND p.created_at_ms <= ?
        ORDER BY oi.id ASC
        "#,
    )
    .bind(start_exclusive.as_i64())
    .bind(end_inclusive.as_i64())
    .fetch_all(&mut *conn)
    .await?;

    let mut lines_by_order: HashMap<OrderId, Vec<SaleLine>> = HashMap::new();
    for row in &line_rows {
        let order_id = OrderId::new(row.try_get("order_id")?);
        lines_by_order.entry(order_id).or_default().push(SaleLine {
            product_id: ProductId::new(row.try_get("product_id")?),
            product_name: row.try_get("product_name")?,
            qty: row.try_get("qty")?,
            unit_price: decimal_col(row, "price_snapshot")?,
        });
    }

    let mut sales = Vec::with_capacity(payment_rows.len());
    for row in &payment_rows {
        let order_id: Option<i64> = row.try_get("order_id")?;
        let order = match order_id.map(OrderId::new) {
            Some(order_id) => Some(SaleOrder {
                order_id,
                daily_seq: row.try_get("daily_seq")?,
                table_name: row.try_get("table_name")?,
                customer_name: row.try_get("customer_name")?,
                lines: lines_by_order.remove(&order_id).unwrap_or_default(),
            }),
            None => None,
        };
        sales.push(SaleRecord {
            payment_id: PaymentId::new(row.try_get("payment_id")?),
            amount: decimal_col(row, "amount")?,
            paid_at_ms: TimeMs::new(row.try_get("paid_at_ms")?),
            order,
        });
    }

    Ok(sales)
}

/// Revenue and payment count since `since`, inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentStats {
    pub revenue: Decimal,
    pub completed_orders: i64,
}

impl Repository {
    pub async fn get_order(&self, id: OrderId) -> Result<Option<Order>, sqlx::Error> {
        let mut conn = self.acquire().await?;
        fetch_order(&mut conn, id).await
    }

    /// Non-terminal orders plus anything created since `day_start`, unpaid
    /// first, then oldest first.
    pub async fn list_today_orders(&self, day_start: TimeMs) -> Result<Vec<Order>, sqlx::Error> {
        let mut conn = self.acquire().await?;
        let sql = format!(
            r#"
            {ORDER_SELECT}
            WHERE status IN ('pending', 'served') OR created_at_ms >= ?
            ORDER BY CASE WHEN id IN (SELECT order_id FROM payments) THEN 1 ELSE 0 END,
                     created_at_ms ASC, id ASC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(day_start.as_i64())
            .fetch_all(&mut *conn)
            .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            let id = OrderId::new(row.try_get("id")?);
            let items = fetch_order_items(&mut conn, id).await?;
            let payment = fetch_payment_for_order(&mut conn, id).await?;
            orders.push(order_from_row(row, items, payment)?);
        }
        Ok(orders)
    }

    /// Payments in `[from, to]`, newest first. Open ends are unbounded.
    pub async fn list_payments(
        &self,
        from: Option<TimeMs>,
        to: Option<TimeMs>,
    ) -> Result<Vec<Payment>, sqlx::Error> {
        let sql = format!(
            "{PAYMENT_SELECT} WHERE created_at_ms >= ? AND created_at_ms <= ? \
             ORDER BY created_at_ms DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(from.map_or(i64::MIN, |t| t.as_i64()))
            .bind(to.map_or(i64::MAX, |t| t.as_i64()))
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(payment_from_row).collect()
    }

    /// Decimal TEXT columns are summed here rather than in SQL, which would
    /// coerce them to floating point.
    pub async fn payment_stats_since(&self, since: TimeMs) -> Result<PaymentStats, sqlx::Error> {
        let rows = sqlx::query("SELECT amount FROM payments WHERE created_at_ms >= ?")
            .bind(since.as_i64())
            .fetch_all(self.pool())
            .await?;

        let mut revenue = Decimal::zero();
        for row in &rows {
            revenue += decimal_col(row, "amount")?;
        }
        Ok(PaymentStats {
            revenue,
            completed_orders: rows.len() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use tempfile::TempDir;

    async fn setup() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    async fn paid_order(conn: &mut SqliteConnection, paid_at: i64, amount: &str) -> OrderId {
        let order_id = insert_order(conn, None, None, 1, TimeMs::EPOCH, TimeMs::new(paid_at))
            .await
            .unwrap();
        insert_payment(
            conn,
            order_id,
            Decimal::from_str_canonical(amount).unwrap(),
            TimeMs::new(paid_at),
        )
        .await
        .unwrap();
        order_id
    }

    #[tokio::test]
    async fn test_sales_window_excludes_start_includes_end() {
        let (repo, _temp) = setup().await;
        let mut conn = repo.acquire().await.unwrap();

        paid_order(&mut conn, 1_000, "10").await;
        let inside = paid_order(&mut conn, 1_500, "20").await;
        let at_end = paid_order(&mut conn, 2_000, "30").await;
        paid_order(&mut conn, 2_001, "40").await;

        let sales = fetch_sales_in_window(&mut conn, TimeMs::new(1_000), TimeMs::new(2_000))
            .await
            .unwrap();

        let order_ids: Vec<OrderId> = sales
            .iter()
            .filter_map(|s| s.order.as_ref().map(|o| o.order_id))
            .collect();
        assert_eq!(order_ids, vec![at_end, inside]);
    }

    #[tokio::test]
    async fn test_sale_lines_attach_to_their_order() {
        let (repo, _temp) = setup().await;
        let mut conn = repo.acquire().await.unwrap();

        let product = crate::db::repo::catalog::insert_product(
            &mut conn,
            "Latte",
            Decimal::from(30),
            Some(Decimal::from(25)),
            TimeMs::new(1),
        )
        .await
        .unwrap();
        let order_id = insert_order(&mut conn, None, Some("Mai"), 2, TimeMs::EPOCH, TimeMs::new(5))
            .await
            .unwrap();
        insert_line_item(
            &mut conn,
            order_id,
            product.id,
            2,
            Decimal::from(25),
            Decimal::from(30),
            TimeMs::new(5),
        )
        .await
        .unwrap();
        insert_payment(&mut conn, order_id, Decimal::from(50), TimeMs::new(10))
            .await
            .unwrap();

        let sales = fetch_sales_in_window(&mut conn, TimeMs::EPOCH, TimeMs::new(10))
            .await
            .unwrap();

        assert_eq!(sales.len(), 1);
        let order = sales[0].order.as_ref().unwrap();
        assert_eq!(order.customer_name.as_deref(), Some("Mai"));
        assert_eq!(order.lines.len(), 1);
        assert_eq!(order.lines[0].unit_price, Decimal::from(25));
        assert_eq!(order.lines[0].product_name.as_deref(), Some("Latte"));
    }

    #[tokio::test]
    async fn test_daily_seq_counts_from_day_start() {
        let (repo, _temp) = setup().await;
        let mut conn = repo.acquire().await.unwrap();

        let a = insert_order(&mut conn, None, None, 1, TimeMs::new(0), TimeMs::new(10))
            .await
            .unwrap();
        let b = insert_order(&mut conn, None, None, 1, TimeMs::new(100), TimeMs::new(200))
            .await
            .unwrap();

        let a = fetch_order(&mut conn, a).await.unwrap().unwrap();
        let b = fetch_order(&mut conn, b).await.unwrap().unwrap();
        assert_eq!(a.daily_seq, 1);
        assert_eq!(b.daily_seq, 1);
    }

    #[tokio::test]
    async fn test_payment_stats_sum_exactly() {
        let (repo, _temp) = setup().await;
        {
            let mut conn = repo.acquire().await.unwrap();
            paid_order(&mut conn, 100, "0.1").await;
            paid_order(&mut conn, 200, "0.2").await;
        }

        let stats = repo.payment_stats_since(TimeMs::EPOCH).await.unwrap();
        assert_eq!(stats.revenue, Decimal::from_str_canonical("0.3").unwrap());
        assert_eq!(stats.completed_orders, 2);
    }
}
