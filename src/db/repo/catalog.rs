//! Ingredient, product and dining table registry.

use crate::domain::{
    Decimal, DiningTable, Ingredient, IngredientId, Product, ProductId, TableId, TableStatus,
    TimeMs,
};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::{decimal_col, opt_decimal_col, Repository};

fn ingredient_from_row(row: &SqliteRow) -> Result<Ingredient, sqlx::Error> {
    Ok(Ingredient {
        id: IngredientId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        unit: row.try_get("unit")?,
    })
}

fn product_from_row(row: &SqliteRow) -> Result<Product, sqlx::Error> {
    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        price: decimal_col(row, "price")?,
        promo_price: opt_decimal_col(row, "promo_price")?,
    })
}

fn table_from_row(row: &SqliteRow) -> Result<DiningTable, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(DiningTable {
        id: TableId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        status: TableStatus::parse(&status).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: format!("unknown table status {:?}", status).into(),
        })?,
    })
}

pub async fn insert_ingredient(
    conn: &mut SqliteConnection,
    name: &str,
    unit: Option<&str>,
    now: TimeMs,
) -> Result<Ingredient, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO ingredients (name, unit, created_at_ms) VALUES (?, ?, ?)",
    )
    .bind(name)
    .bind(unit)
    .bind(now.as_i64())
    .execute(&mut *conn)
    .await?;

    Ok(Ingredient {
        id: IngredientId::new(result.last_insert_rowid()),
        name: name.to_string(),
        unit: unit.map(str::to_string),
    })
}

pub async fn insert_product(
    conn: &mut SqliteConnection,
    name: &str,
    price: Decimal,
    promo_price: Option<Decimal>,
    now: TimeMs,
) -> Result<Product, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO products (name, price, promo_price, created_at_ms) VALUES (?, ?, ?, ?)",
    )
    .bind(name)
    .bind(price.to_canonical_string())
    .bind(promo_price.map(|p| p.to_canonical_string()))
    .bind(now.as_i64())
    .execute(&mut *conn)
    .await?;

    Ok(Product {
        id: ProductId::new(result.last_insert_rowid()),
        name: name.to_string(),
        price,
        promo_price,
    })
}

pub async fn fetch_product(
    conn: &mut SqliteConnection,
    id: ProductId,
) -> Result<Option<Product>, sqlx::Error> {
    let row = sqlx::query("SELECT id, name, price, promo_price FROM products WHERE id = ?")
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(product_from_row).transpose()
}

pub async fn insert_table(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<DiningTable, sqlx::Error> {
    let result = sqlx::query("INSERT INTO dining_tables (name, status) VALUES (?, 'available')")
        .bind(name)
        .execute(&mut *conn)
        .await?;

    Ok(DiningTable {
        id: TableId::new(result.last_insert_rowid()),
        name: name.to_string(),
        status: TableStatus::Available,
    })
}

pub async fn fetch_table(
    conn: &mut SqliteConnection,
    id: TableId,
) -> Result<Option<DiningTable>, sqlx::Error> {
    let row = sqlx::query("SELECT id, name, status FROM dining_tables WHERE id = ?")
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(table_from_row).transpose()
}

/// Mark a table occupied as the first write of an order transaction.
/// Returns false if the table does not exist.
pub async fn claim_table(conn: &mut SqliteConnection, id: TableId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE dining_tables SET status = 'occupied' WHERE id = ?")
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_table_status(
    conn: &mut SqliteConnection,
    id: TableId,
    status: TableStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE dining_tables SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

impl Repository {
    pub async fn create_ingredient(
        &self,
        name: &str,
        unit: Option<&str>,
        now: TimeMs,
    ) -> Result<Ingredient, sqlx::Error> {
        let mut conn = self.acquire().await?;
        insert_ingredient(&mut conn, name, unit, now).await
    }

    pub async fn list_ingredients(&self) -> Result<Vec<Ingredient>, sqlx::Error> {
        let rows = sqlx::query("SELECT id, name, unit FROM ingredients ORDER BY name ASC, id ASC")
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(ingredient_from_row).collect()
    }

    pub async fn create_product(
        &self,
        name: &str,
        price: Decimal,
        promo_price: Option<Decimal>,
        now: TimeMs,
    ) -> Result<Product, sqlx::Error> {
        let mut conn = self.acquire().await?;
        insert_product(&mut conn, name, price, promo_price, now).await
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, sqlx::Error> {
        let rows = sqlx::query("SELECT id, name, price, promo_price FROM products ORDER BY id ASC")
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(product_from_row).collect()
    }

    pub async fn create_table(&self, name: &str) -> Result<DiningTable, sqlx::Error> {
        let mut conn = self.acquire().await?;
        insert_table(&mut conn, name).await
    }

    pub async fn get_table(&self, id: TableId) -> Result<Option<DiningTable>, sqlx::Error> {
        let mut conn = self.acquire().await?;
        fetch_table(&mut conn, id).await
    }

    pub async fn list_tables(&self) -> Result<Vec<DiningTable>, sqlx::Error> {
        let rows = sqlx::query("SELECT id, name, status FROM dining_tables ORDER BY id ASC")
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(table_from_row).collect()
    }
}
