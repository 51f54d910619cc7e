//! Dashboard handlers

use axum::{
    extract::{Query, State},
    Json,
};
use shared::MANAGEMENT_ROLES;

use crate::error::AppResult;
use crate::middleware::{require_role, CurrentUser};
use crate::services::dashboard::{
    DashboardFilter, InventoryMetrics, Overview, SalesMetrics, TopClient, TopFilter, TopProduct,
};
use crate::services::DashboardService;
use crate::AppState;

pub async fn dashboard_overview(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<DashboardFilter>,
) -> AppResult<Json<Overview>> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    Ok(Json(DashboardService::new(state.db).overview(filter).await?))
}

pub async fn dashboard_sales_metrics(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<DashboardFilter>,
) -> AppResult<Json<SalesMetrics>> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    Ok(Json(DashboardService::new(state.db).sales_metrics(filter).await?))
}

pub async fn dashboard_inventory_metrics(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<DashboardFilter>,
) -> AppResult<Json<InventoryMetrics>> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    Ok(Json(DashboardService::new(state.db).inventory_metrics(filter).await?))
}

pub async fn dashboard_top_clients(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<TopFilter>,
) -> AppResult<Json<Vec<TopClient>>> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    Ok(Json(DashboardService::new(state.db).top_clients(filter).await?))
}

pub async fn dashboard_top_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<TopFilter>,
) -> AppResult<Json<Vec<TopProduct>>> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    Ok(Json(DashboardService::new(state.db).top_products(filter).await?))
}
