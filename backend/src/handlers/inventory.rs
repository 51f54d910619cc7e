//! Inventory ledger handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use shared::{PaginatedResponse, StockReconciliation, StockSummary, ALL_ROLES, MANAGEMENT_ROLES};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_role, CurrentUser};
use crate::services::inventory::{InventoryMovement, MovementFilter};
use crate::services::InventoryService;
use crate::AppState;

pub async fn list_movements(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<MovementFilter>,
) -> AppResult<Json<PaginatedResponse<InventoryMovement>>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let movements = InventoryService::new(state.db).list_movements(filter).await?;
    Ok(Json(movements))
}

pub async fn stock_summary(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<StockSummary>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let summary = InventoryService::new(state.db).summary().await?;
    Ok(Json(summary))
}

/// Check a product's counters against its ledger
pub async fn reconcile_product_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<StockReconciliation>> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    let reconciliation = InventoryService::new(state.db)
        .reconcile_product(product_id)
        .await?;
    Ok(Json(reconciliation))
}
