//! Expense handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{PaginatedResponse, MANAGEMENT_ROLES};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_role, CurrentUser};
use crate::services::expense::{CreateExpenseInput, Expense, ExpenseFilter, UpdateExpenseInput};
use crate::services::ExpenseService;
use crate::AppState;

pub async fn create_expense(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateExpenseInput>,
) -> AppResult<(StatusCode, Json<Expense>)> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    let expense = ExpenseService::new(state.db)
        .create(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

pub async fn list_expenses(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ExpenseFilter>,
) -> AppResult<Json<PaginatedResponse<Expense>>> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    let expenses = ExpenseService::new(state.db).list(filter).await?;
    Ok(Json(expenses))
}

pub async fn get_expense(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(expense_id): Path<Uuid>,
) -> AppResult<Json<Expense>> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    let expense = ExpenseService::new(state.db).get(expense_id).await?;
    Ok(Json(expense))
}

pub async fn update_expense(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(expense_id): Path<Uuid>,
    Json(input): Json<UpdateExpenseInput>,
) -> AppResult<Json<Expense>> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    let expense = ExpenseService::new(state.db).update(expense_id, input).await?;
    Ok(Json(expense))
}

pub async fn delete_expense(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(expense_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    ExpenseService::new(state.db).remove(expense_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
