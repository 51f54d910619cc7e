//! Product (SKU) handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{PaginatedResponse, ALL_ROLES, MANAGEMENT_ROLES};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_role, CurrentUser};
use crate::services::product::{
    AdjustStockInput, CreateProductInput, CreatedProduct, Product, ProductFilter, UpdateProductInput,
};
use crate::services::ProductService;
use crate::AppState;

/// Pack a product from a roast
pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<CreatedProduct>)> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    let created = ProductService::new(state.db)
        .create(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<PaginatedResponse<Product>>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let products = ProductService::new(state.db).list(filter).await?;
    Ok(Json(products))
}

pub async fn low_stock_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<Product>>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let products = ProductService::new(state.db).low_stock().await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let product = ProductService::new(state.db).get(product_id).await?;
    Ok(Json(product))
}

pub async fn update_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    let product = ProductService::new(state.db).update(product_id, input).await?;
    Ok(Json(product))
}

/// Manual stock correction
pub async fn adjust_product_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<AdjustStockInput>,
) -> AppResult<Json<Product>> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    let product = ProductService::new(state.db)
        .adjust_stock(current_user.0.user_id, product_id, input)
        .await?;
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    ProductService::new(state.db).remove(product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
