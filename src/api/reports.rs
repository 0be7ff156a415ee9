use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::domain::{Decimal, Payment, TimeMs};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentsQuery {
    pub from_ms: Option<i64>,
    pub to_ms: Option<i64>,
}

pub async fn list_payments(
    Query(params): Query<PaymentsQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let from_ms = params.from_ms.map(TimeMs::new);
    let to_ms = params.to_ms.map(TimeMs::new);

    if let (Some(from), Some(to)) = (from_ms, to_ms) {
        if from > to {
            return Err(AppError::BadRequest("fromMs must be <= toMs".to_string()));
        }
    }

    Ok(Json(state.repo.list_payments(from_ms, to_ms).await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayStatsResponse {
    pub since_ms: TimeMs,
    pub revenue: Decimal,
    pub completed_orders: i64,
}

/// Revenue and completed orders since the start of the current UTC day.
pub async fn today_stats(
    State(state): State<AppState>,
) -> Result<Json<TodayStatsResponse>, AppError> {
    let since = state.clock.now().utc_day_start();
    let stats = state.repo.payment_stats_since(since).await?;
    Ok(Json(TodayStatsResponse {
        since_ms: since,
        revenue: stats.revenue,
        completed_orders: stats.completed_orders,
    }))
}
