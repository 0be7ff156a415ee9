use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::AppState;
use crate::domain::{Decimal, InventoryLot, LotId, PurchaseLine, PurchaseOrder, TimeMs};
use crate::error::AppError;

pub async fn list_lots(
    State(state): State<AppState>,
) -> Result<Json<Vec<InventoryLot>>, AppError> {
    Ok(Json(state.repo.list_lots().await?))
}

pub async fn get_lot(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<InventoryLot>, AppError> {
    Ok(Json(state.inventory.get_lot(LotId::new(id)).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPurchaseRequest {
    pub supplier: Option<String>,
    pub purchased_at_ms: Option<i64>,
    pub items: Vec<PurchaseLine>,
}

pub async fn record_purchase(
    State(state): State<AppState>,
    Json(body): Json<RecordPurchaseRequest>,
) -> Result<(StatusCode, Json<PurchaseOrder>), AppError> {
    let supplier = body
        .supplier
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let purchase = state
        .inventory
        .record_purchase_order(supplier, body.purchased_at_ms.map(TimeMs::new), body.items)
        .await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockCountRequest {
    pub remaining_qty: Decimal,
    pub unit_cost: Option<Decimal>,
}

pub async fn record_stock_count(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<StockCountRequest>,
) -> Result<Json<InventoryLot>, AppError> {
    let lot = state
        .inventory
        .record_stock_count(LotId::new(id), body.remaining_qty, body.unit_cost)
        .await?;
    Ok(Json(lot))
}
