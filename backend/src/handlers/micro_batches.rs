//! Roasting run (micro-batch) handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{PaginatedResponse, ALL_ROLES, MANAGEMENT_ROLES};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_role, CurrentUser};
use crate::services::expense::{Expense, RoastExpenseInput};
use crate::services::micro_batch::{
    CreateMicroBatchInput, MicroBatch, MicroBatchCost, MicroBatchFilter, UpdateMicroBatchInput,
};
use crate::services::MicroBatchService;
use crate::AppState;

/// Register a roast
pub async fn create_micro_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateMicroBatchInput>,
) -> AppResult<(StatusCode, Json<MicroBatch>)> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    let micro_batch = MicroBatchService::new(state.db)
        .create(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(micro_batch)))
}

pub async fn list_micro_batches(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<MicroBatchFilter>,
) -> AppResult<Json<PaginatedResponse<MicroBatch>>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let micro_batches = MicroBatchService::new(state.db).list(filter).await?;
    Ok(Json(micro_batches))
}

pub async fn get_micro_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(micro_batch_id): Path<Uuid>,
) -> AppResult<Json<MicroBatch>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let micro_batch = MicroBatchService::new(state.db).get(micro_batch_id).await?;
    Ok(Json(micro_batch))
}

pub async fn update_micro_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(micro_batch_id): Path<Uuid>,
    Json(input): Json<UpdateMicroBatchInput>,
) -> AppResult<Json<MicroBatch>> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    let micro_batch = MicroBatchService::new(state.db)
        .update(current_user.0.user_id, micro_batch_id, input)
        .await?;
    Ok(Json(micro_batch))
}

pub async fn delete_micro_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(micro_batch_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    MicroBatchService::new(state.db)
        .remove(current_user.0.user_id, micro_batch_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Book an expense against a roast
pub async fn add_micro_batch_expense(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(micro_batch_id): Path<Uuid>,
    Json(input): Json<RoastExpenseInput>,
) -> AppResult<(StatusCode, Json<Expense>)> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    let expense = MicroBatchService::new(state.db)
        .add_expense(current_user.0.user_id, micro_batch_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn micro_batch_costs(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(micro_batch_id): Path<Uuid>,
) -> AppResult<Json<MicroBatchCost>> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    let cost = MicroBatchService::new(state.db)
        .cost_breakdown(micro_batch_id)
        .await?;
    Ok(Json(cost))
}
