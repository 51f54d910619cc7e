//! Product catalog handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{PaginatedResponse, ALL_ROLES, MANAGEMENT_ROLES};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_role, CurrentUser};
use crate::services::catalog::{CatalogEntry, CatalogFilter, CreateCatalogInput, UpdateCatalogInput};
use crate::services::CatalogService;
use crate::AppState;

pub async fn create_catalog_entry(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateCatalogInput>,
) -> AppResult<(StatusCode, Json<CatalogEntry>)> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    let entry = CatalogService::new(state.db).create(input).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn list_catalog(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<CatalogFilter>,
) -> AppResult<Json<PaginatedResponse<CatalogEntry>>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let entries = CatalogService::new(state.db).list(filter).await?;
    Ok(Json(entries))
}

pub async fn get_catalog_entry(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(entry_id): Path<Uuid>,
) -> AppResult<Json<CatalogEntry>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let entry = CatalogService::new(state.db).get(entry_id).await?;
    Ok(Json(entry))
}

pub async fn update_catalog_entry(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(entry_id): Path<Uuid>,
    Json(input): Json<UpdateCatalogInput>,
) -> AppResult<Json<CatalogEntry>> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    let entry = CatalogService::new(state.db).update(entry_id, input).await?;
    Ok(Json(entry))
}

pub async fn delete_catalog_entry(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(entry_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    CatalogService::new(state.db).remove(entry_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
