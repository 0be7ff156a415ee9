use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::AppState;
use crate::domain::{Decimal, LineItemId, Order, OrderId, ProductId, TableId};
use crate::error::AppError;
use crate::orchestration::NewOrder;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub table_id: Option<i64>,
    pub customer_name: Option<String>,
    pub guest_count: Option<i64>,
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let customer_name = body
        .customer_name
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let order = state
        .orders
        .create_order(NewOrder {
            table_id: body.table_id.map(TableId::new),
            customer_name,
            guest_count: body.guest_count,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_today_orders(
    State(state): State<AppState>,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.orders.list_today().await?))
}

pub async fn get_order(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders.get(OrderId::new(id)).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLineItemRequest {
    pub product_id: i64,
    pub qty: Option<i64>,
}

pub async fn add_line_item(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<AddLineItemRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .add_line_item(
            OrderId::new(id),
            ProductId::new(body.product_id),
            body.qty.unwrap_or(1),
        )
        .await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct SetQtyRequest {
    pub qty: i64,
}

pub async fn set_line_item_qty(
    Path(item_id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<SetQtyRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .set_line_item_qty(LineItemId::new(item_id), body.qty)
        .await?;
    Ok(Json(order))
}

pub async fn mark_served(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders.mark_served(OrderId::new(id)).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompleteOrderRequest {
    pub discount: Option<Decimal>,
}

impl CompleteOrderRequest {
    /// An empty body means no manual discount. Anything else must parse.
    fn from_body(body: &[u8]) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("invalid complete request: {e}")))
    }
}

pub async fn complete_order(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Order>, AppError> {
    let request = CompleteOrderRequest::from_body(&body)?;
    let discount = request.discount.unwrap_or_else(Decimal::zero);
    let order = state.orders.complete(OrderId::new(id), discount).await?;
    Ok(Json(order))
}

pub async fn cancel_order(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orders.cancel(OrderId::new(id)).await?))
}
