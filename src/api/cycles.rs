use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::AppState;
use crate::domain::{CycleId, ProfitCycle};
use crate::error::AppError;

pub async fn list_cycles(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProfitCycle>>, AppError> {
    Ok(Json(state.cycles.list().await?))
}

pub async fn close_cycle(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ProfitCycle>), AppError> {
    let cycle = state.cycles.close().await?;
    Ok((StatusCode::CREATED, Json(cycle)))
}

pub async fn get_cycle(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<ProfitCycle>, AppError> {
    Ok(Json(state.cycles.get(CycleId::new(id)).await?))
}

pub async fn delete_cycle(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.cycles.delete(CycleId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
