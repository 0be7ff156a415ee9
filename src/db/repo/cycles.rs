//! Profit cycle persistence, baseline lookups and the close guard.

use crate::domain::{
    CycleId, CycleStatus, NewProfitCycle, ProfitCycle, SnapshotEntry, TimeMs,
};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::{decimal_col, json_col, to_json, Repository};

/// The cycle whose end bounds the next revenue window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleAnchor {
    pub cycle_id: CycleId,
    pub end_ms: TimeMs,
}

/// The cycle whose snapshot is the baseline for the next cost attribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotBaseline {
    pub cycle_id: CycleId,
    pub entries: Vec<SnapshotEntry>,
}

const CYCLE_SELECT: &str = r#"
    SELECT id, start_ms, end_ms, status, revenue, cost, profit,
           revenue_details, cost_details, inventory_snapshot, created_at_ms
    FROM profit_cycles
"#;

fn cycle_from_row(row: &SqliteRow) -> Result<ProfitCycle, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(ProfitCycle {
        id: CycleId::new(row.try_get("id")?),
        start_ms: TimeMs::new(row.try_get("start_ms")?),
        end_ms: TimeMs::new(row.try_get("end_ms")?),
        status: CycleStatus::parse(&status).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: format!("unknown cycle status {:?}", status).into(),
        })?,
        revenue: decimal_col(row, "revenue")?,
        cost: decimal_col(row, "cost")?,
        profit: decimal_col(row, "profit")?,
        revenue_details: json_col(row, "revenue_details")?,
        cost_details: json_col(row, "cost_details")?,
        inventory_snapshot: json_col(row, "inventory_snapshot")?,
        created_at_ms: TimeMs::new(row.try_get("created_at_ms")?),
    })
}

pub async fn insert_cycle(
    conn: &mut SqliteConnection,
    cycle: NewProfitCycle,
    created_at: TimeMs,
) -> Result<ProfitCycle, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO profit_cycles (
            start_ms, end_ms, status, revenue, cost, profit,
            revenue_details, cost_details, inventory_snapshot, created_at_ms
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(cycle.start_ms.as_i64())
    .bind(cycle.end_ms.as_i64())
    .bind(CycleStatus::Closed.as_str())
    .bind(cycle.revenue.to_canonical_string())
    .bind(cycle.cost.to_canonical_string())
    .bind(cycle.profit.to_canonical_string())
    .bind(to_json(&cycle.revenue_details)?)
    .bind(to_json(&cycle.cost_details)?)
    .bind(to_json(&cycle.inventory_snapshot)?)
    .bind(created_at.as_i64())
    .execute(&mut *conn)
    .await?;

    Ok(cycle.into_cycle(CycleId::new(result.last_insert_rowid()), created_at))
}

pub async fn fetch_cycle(
    conn: &mut SqliteConnection,
    id: CycleId,
) -> Result<Option<ProfitCycle>, sqlx::Error> {
    let sql = format!("{CYCLE_SELECT} WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(cycle_from_row).transpose()
}

pub async fn delete_cycle(conn: &mut SqliteConnection, id: CycleId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM profit_cycles WHERE id = ?")
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Closed cycle with the greatest end timestamp.
pub async fn most_recent_by_end_date(
    conn: &mut SqliteConnection,
) -> Result<Option<CycleAnchor>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, end_ms FROM profit_cycles
        WHERE status = 'closed'
        ORDER BY end_ms DESC, id DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|r| {
        Ok(CycleAnchor {
            cycle_id: CycleId::new(r.try_get("id")?),
            end_ms: TimeMs::new(r.try_get("end_ms")?),
        })
    })
    .transpose()
}

/// Snapshot stored on the most recently created cycle.
pub async fn most_recent_by_creation(
    conn: &mut SqliteConnection,
) -> Result<Option<SnapshotBaseline>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, inventory_snapshot FROM profit_cycles
        ORDER BY created_at_ms DESC, id DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|r| {
        Ok(SnapshotBaseline {
            cycle_id: CycleId::new(r.try_get("id")?),
            entries: json_col(&r, "inventory_snapshot")?,
        })
    })
    .transpose()
}

/// Take SQLite's write lock for the rest of the transaction and return the
/// close watermark. Must be the first statement of a close.
pub async fn lock_close_guard(conn: &mut SqliteConnection) -> Result<TimeMs, sqlx::Error> {
    sqlx::query("UPDATE close_guard SET last_close_ms = last_close_ms WHERE id = 1")
        .execute(&mut *conn)
        .await?;
    close_watermark(conn).await
}

/// Highest `end_ms` any close has committed. Zero before the first close.
pub async fn close_watermark(conn: &mut SqliteConnection) -> Result<TimeMs, sqlx::Error> {
    let last: Option<i64> =
        sqlx::query_scalar("SELECT last_close_ms FROM close_guard WHERE id = 1")
            .fetch_optional(&mut *conn)
            .await?;
    Ok(TimeMs::new(last.unwrap_or(0)))
}

pub async fn advance_close_watermark(
    conn: &mut SqliteConnection,
    end: TimeMs,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE close_guard SET last_close_ms = MAX(last_close_ms, ?) WHERE id = 1")
        .bind(end.as_i64())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

impl Repository {
    /// All cycles, newest first.
    pub async fn list_cycles(&self) -> Result<Vec<ProfitCycle>, sqlx::Error> {
        let sql = format!("{CYCLE_SELECT} ORDER BY created_at_ms DESC, id DESC");
        let rows = sqlx::query(&sql).fetch_all(self.pool()).await?;
        rows.iter().map(cycle_from_row).collect()
    }

    pub async fn get_cycle(&self, id: CycleId) -> Result<Option<ProfitCycle>, sqlx::Error> {
        let mut conn = self.acquire().await?;
        fetch_cycle(&mut conn, id).await
    }
}
