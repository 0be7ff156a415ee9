use crate::orchestration::{CycleError, InventoryError, OrderError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error returned by every handler, rendered as
/// `{"error": "<kind>", "message": "<text>"}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
    #[error("Table occupied: {0}")]
    TableOccupied(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Computation failed: {0}")]
    ComputationFailed(String),
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::InvalidQuantity(_) => "invalid_quantity",
            AppError::TableOccupied(_) => "table_occupied",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::BadRequest(_) => "bad_request",
            AppError::ComputationFailed(_) => "computation_failed",
            AppError::TransactionAborted(_) => "transaction_aborted",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidQuantity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::TableOccupied(_) | AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ComputationFailed(_)
            | AppError::TransactionAborted(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if err
            .as_database_error()
            .is_some_and(|e| e.is_unique_violation())
        {
            return AppError::BadRequest("an entry with that name already exists".to_string());
        }
        tracing::error!(error = %err, "Storage error");
        AppError::Internal("storage error".to_string())
    }
}

impl From<CycleError> for AppError {
    fn from(err: CycleError) -> Self {
        match err {
            CycleError::NotFound(_) => AppError::NotFound(err.to_string()),
            CycleError::ComputationFailed(msg) => AppError::ComputationFailed(msg),
            CycleError::Db(e) => e.into(),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::OrderNotFound(_)
            | OrderError::LineItemNotFound(_)
            | OrderError::ProductNotFound(_)
            | OrderError::TableNotFound(_) => AppError::NotFound(err.to_string()),
            OrderError::TableOccupied(_) => AppError::TableOccupied(err.to_string()),
            OrderError::InvalidTransition { .. } => AppError::InvalidTransition(err.to_string()),
            OrderError::InvalidQuantity(msg) => AppError::InvalidQuantity(msg),
            OrderError::BadRequest(msg) => AppError::BadRequest(msg),
            OrderError::TransactionAborted(e) => {
                tracing::error!(error = %e, "Order transaction aborted, rolled back");
                AppError::TransactionAborted("order change was rolled back".to_string())
            }
        }
    }
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::LotNotFound(_) => AppError::NotFound(err.to_string()),
            InventoryError::InvalidQuantity(msg) => AppError::InvalidQuantity(msg),
            InventoryError::BadRequest(msg) => AppError::BadRequest(msg),
            InventoryError::Db(e) => e.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let message = match self {
            AppError::NotFound(msg)
            | AppError::InvalidQuantity(msg)
            | AppError::TableOccupied(msg)
            | AppError::InvalidTransition(msg)
            | AppError::BadRequest(msg)
            | AppError::ComputationFailed(msg)
            | AppError::TransactionAborted(msg)
            | AppError::Internal(msg) => msg,
        };

        let body = Json(json!({
            "error": kind,
            "message": message,
        }));

        (status, body).into_response()
    }
}
