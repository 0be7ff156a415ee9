use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::api::AppState;
use crate::domain::{Decimal, DiningTable, Ingredient, Product};
use crate::error::AppError;

fn required_name(name: &str, what: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest(format!("{what} name must not be empty")));
    }
    Ok(name.to_string())
}

#[derive(Debug, Deserialize)]
pub struct CreateIngredientRequest {
    pub name: String,
    pub unit: Option<String>,
}

pub async fn list_ingredients(
    State(state): State<AppState>,
) -> Result<Json<Vec<Ingredient>>, AppError> {
    Ok(Json(state.repo.list_ingredients().await?))
}

pub async fn create_ingredient(
    State(state): State<AppState>,
    Json(body): Json<CreateIngredientRequest>,
) -> Result<(StatusCode, Json<Ingredient>), AppError> {
    let name = required_name(&body.name, "ingredient")?;
    let unit = body
        .unit
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let ingredient = state
        .repo
        .create_ingredient(&name, unit, state.clock.now())
        .await?;
    Ok((StatusCode::CREATED, Json(ingredient)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub price: Decimal,
    pub promo_price: Option<Decimal>,
}

pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(state.repo.list_products().await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let name = required_name(&body.name, "product")?;
    if body.price.is_negative() || body.promo_price.is_some_and(|p| p.is_negative()) {
        return Err(AppError::BadRequest("prices must not be negative".to_string()));
    }
    let product = state
        .repo
        .create_product(&name, body.price, body.promo_price, state.clock.now())
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[derive(Debug, Deserialize)]
pub struct CreateTableRequest {
    pub name: String,
}

pub async fn list_tables(
    State(state): State<AppState>,
) -> Result<Json<Vec<DiningTable>>, AppError> {
    Ok(Json(state.repo.list_tables().await?))
}

pub async fn create_table(
    State(state): State<AppState>,
    Json(body): Json<CreateTableRequest>,
) -> Result<(StatusCode, Json<DiningTable>), AppError> {
    let name = required_name(&body.name, "table")?;
    let table = state.repo.create_table(&name).await?;
    Ok((StatusCode::CREATED, Json(table)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_name_trims() {
        assert_eq!(required_name("  Milk ", "ingredient").unwrap(), "Milk");
    }

    #[test]
    fn test_required_name_rejects_blank() {
        assert!(matches!(
            required_name("   ", "table"),
            Err(AppError::BadRequest(_))
        ));
    }
}
