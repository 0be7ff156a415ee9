//! Purchase order and inventory lot operations.

use crate::domain::{
    Decimal, IngredientId, InventoryLot, LotId, PurchaseLine, PurchaseOrder, PurchaseOrderId,
    TimeMs,
};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::{decimal_col, Repository};

const LOT_SELECT: &str = r#"
    SELECT l.id, l.purchase_order_id, l.ingredient_id, i.name AS ingredient_name,
           l.original_qty, l.remaining_qty, l.unit_cost,
           po.purchased_at_ms, l.created_at_ms
    FROM inventory_lots l
    JOIN purchase_orders po ON po.id = l.purchase_order_id
    LEFT JOIN ingredients i ON i.id = l.ingredient_id
"#;

fn lot_from_row(row: &SqliteRow) -> Result<InventoryLot, sqlx::Error> {
    Ok(InventoryLot {
        id: LotId::new(row.try_get("id")?),
        purchase_order_id: PurchaseOrderId::new(row.try_get("purchase_order_id")?),
        ingredient_id: IngredientId::new(row.try_get("ingredient_id")?),
        ingredient_name: row.try_get("ingredient_name")?,
        original_qty: decimal_col(row, "original_qty")?,
        remaining_qty: decimal_col(row, "remaining_qty")?,
        unit_cost: decimal_col(row, "unit_cost")?,
        purchased_at_ms: TimeMs::new(row.try_get("purchased_at_ms")?),
        created_at_ms: TimeMs::new(row.try_get("created_at_ms")?),
    })
}

/// Insert a purchase order and one lot per line, each with remaining = qty.
pub async fn insert_purchase_order(
    conn: &mut SqliteConnection,
    supplier: Option<&str>,
    purchased_at: TimeMs,
    lines: &[PurchaseLine],
    now: TimeMs,
) -> Result<PurchaseOrder, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO purchase_orders (supplier, purchased_at_ms, created_at_ms) VALUES (?, ?, ?)",
    )
    .bind(supplier)
    .bind(purchased_at.as_i64())
    .bind(now.as_i64())
    .execute(&mut *conn)
    .await?;
    let purchase_order_id = PurchaseOrderId::new(result.last_insert_rowid());

    for line in lines {
        let qty = line.qty.to_canonical_string();
        sqlx::query(
            r#"
            INSERT INTO inventory_lots (
                purchase_order_id, ingredient_id, original_qty, remaining_qty,
                unit_cost, created_at_ms, updated_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(purchase_order_id.as_i64())
        .bind(line.ingredient_id.as_i64())
        .bind(&qty)
        .bind(&qty)
        .bind(line.unit_cost.to_canonical_string())
        .bind(now.as_i64())
        .bind(now.as_i64())
        .execute(&mut *conn)
        .await?;
    }

    let lots = fetch_lots_for_purchase_order(conn, purchase_order_id).await?;
    Ok(PurchaseOrder {
        id: purchase_order_id,
        supplier: supplier.map(str::to_string),
        purchased_at_ms: purchased_at,
        lots,
    })
}

pub async fn fetch_lots_for_purchase_order(
    conn: &mut SqliteConnection,
    purchase_order_id: PurchaseOrderId,
) -> Result<Vec<InventoryLot>, sqlx::Error> {
    let sql = format!("{LOT_SELECT} WHERE l.purchase_order_id = ? ORDER BY l.id ASC");
    let rows = sqlx::query(&sql)
        .bind(purchase_order_id.as_i64())
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(lot_from_row).collect()
}

pub async fn fetch_lot(
    conn: &mut SqliteConnection,
    id: LotId,
) -> Result<Option<InventoryLot>, sqlx::Error> {
    let sql = format!("{LOT_SELECT} WHERE l.id = ?");
    let row = sqlx::query(&sql)
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(lot_from_row).transpose()
}

/// Every lot in id order; the input to cost attribution.
pub async fn fetch_all_lots(conn: &mut SqliteConnection) -> Result<Vec<InventoryLot>, sqlx::Error> {
    let sql = format!("{LOT_SELECT} ORDER BY l.id ASC");
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    rows.iter().map(lot_from_row).collect()
}

/// Overwrite the counted stock, and the unit cost when one is given.
pub async fn update_lot_stock(
    conn: &mut SqliteConnection,
    id: LotId,
    remaining_qty: Decimal,
    unit_cost: Option<Decimal>,
    now: TimeMs,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE inventory_lots
        SET remaining_qty = ?,
            unit_cost = COALESCE(?, unit_cost),
            updated_at_ms = ?
        WHERE id = ?
        "#,
    )
    .bind(remaining_qty.to_canonical_string())
    .bind(unit_cost.map(|c| c.to_canonical_string()))
    .bind(now.as_i64())
    .bind(id.as_i64())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

impl Repository {
    pub async fn get_lot(&self, id: LotId) -> Result<Option<InventoryLot>, sqlx::Error> {
        let mut conn = self.acquire().await?;
        fetch_lot(&mut conn, id).await
    }

    /// All lots, most recent purchase first.
    pub async fn list_lots(&self) -> Result<Vec<InventoryLot>, sqlx::Error> {
        let sql = format!("{LOT_SELECT} ORDER BY po.purchased_at_ms DESC, l.id DESC");
        let rows = sqlx::query(&sql).fetch_all(self.pool()).await?;
        rows.iter().map(lot_from_row).collect()
    }
}
