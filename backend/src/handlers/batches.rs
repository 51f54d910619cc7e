//! Green coffee batch handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{PaginatedResponse, ALL_ROLES, MANAGEMENT_ROLES};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_role, CurrentUser};
use crate::services::batch::{Batch, BatchFilter, BatchSummary, CreateBatchInput, UpdateBatchInput};
use crate::services::BatchService;
use crate::AppState;

/// Register a batch purchase
pub async fn create_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateBatchInput>,
) -> AppResult<(StatusCode, Json<Batch>)> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    let batch = BatchService::new(state.db)
        .create(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

pub async fn list_batches(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<BatchFilter>,
) -> AppResult<Json<PaginatedResponse<Batch>>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let batches = BatchService::new(state.db).list(filter).await?;
    Ok(Json(batches))
}

pub async fn get_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(batch_id): Path<Uuid>,
) -> AppResult<Json<Batch>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let batch = BatchService::new(state.db).get(batch_id).await?;
    Ok(Json(batch))
}

pub async fn update_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(batch_id): Path<Uuid>,
    Json(input): Json<UpdateBatchInput>,
) -> AppResult<Json<Batch>> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    let batch = BatchService::new(state.db)
        .update(current_user.0.user_id, batch_id, input)
        .await?;
    Ok(Json(batch))
}

pub async fn delete_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(batch_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    BatchService::new(state.db).remove(batch_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Batch with its expenses and cost totals
pub async fn batch_summary(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(batch_id): Path<Uuid>,
) -> AppResult<Json<BatchSummary>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let summary = BatchService::new(state.db).summary(batch_id).await?;
    Ok(Json(summary))
}
