//! Order handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{PaginatedResponse, ALL_ROLES, MANAGEMENT_ROLES};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_role, CurrentUser};
use crate::services::order::{
    CreateOrderInput, Order, OrderDetail, OrderFilter, OrderStatistics, UpdateOrderInput,
    UpdateStatusInput,
};
use crate::services::OrderService;
use crate::AppState;

fn order_service(state: AppState) -> OrderService {
    OrderService::new(state.db, state.config.orders.public_user_email.clone())
}

pub async fn create_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<(StatusCode, Json<OrderDetail>)> {
    require_role(&current_user.0, ALL_ROLES)?;
    let order = order_service(state)
        .create(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Storefront order placement (public)
pub async fn create_public_order(
    State(state): State<AppState>,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<(StatusCode, Json<OrderDetail>)> {
    let order = order_service(state).create_public(input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<OrderFilter>,
) -> AppResult<Json<PaginatedResponse<Order>>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let orders = order_service(state).list(filter).await?;
    Ok(Json(orders))
}

pub async fn list_client_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(client_id): Path<Uuid>,
    Query(filter): Query<OrderFilter>,
) -> AppResult<Json<PaginatedResponse<Order>>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let orders = order_service(state).list_by_client(client_id, filter).await?;
    Ok(Json(orders))
}

pub async fn order_statistics(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<OrderStatistics>> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    let statistics = order_service(state).statistics().await?;
    Ok(Json(statistics))
}

pub async fn get_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderDetail>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let order = order_service(state).get(order_id).await?;
    Ok(Json(order))
}

pub async fn update_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateOrderInput>,
) -> AppResult<Json<OrderDetail>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let order = order_service(state).update(order_id, input).await?;
    Ok(Json(order))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateStatusInput>,
) -> AppResult<Json<OrderDetail>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let order = order_service(state)
        .update_status(order_id, input.status)
        .await?;
    Ok(Json(order))
}

pub async fn confirm_order_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderDetail>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let order = order_service(state).confirm_payment(order_id).await?;
    Ok(Json(order))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderDetail>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let order = order_service(state)
        .cancel(current_user.0.user_id, order_id)
        .await?;
    Ok(Json(order))
}

pub async fn delete_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    order_service(state).remove(order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
