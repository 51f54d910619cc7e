//! User management handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{PaginatedResponse, UserRole};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{require_role, CurrentUser};
use crate::services::user::{CreateUserInput, UpdateUserInput, User, UserFilter};
use crate::services::UserService;
use crate::AppState;

const ADMIN_ONLY: &[UserRole] = &[UserRole::Admin];

pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<User>)> {
    require_role(&current_user.0, ADMIN_ONLY)?;
    let user = UserService::new(state.db).create(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<UserFilter>,
) -> AppResult<Json<PaginatedResponse<User>>> {
    require_role(&current_user.0, ADMIN_ONLY)?;
    let users = UserService::new(state.db).list(filter).await?;
    Ok(Json(users))
}

/// Admins may read anyone; other users only themselves
pub async fn get_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<User>> {
    if !current_user.0.is_admin() && current_user.0.user_id != user_id {
        return Err(AppError::InsufficientPermissions);
    }
    let user = UserService::new(state.db).get(user_id).await?;
    Ok(Json(user))
}

/// Field-level permissions are enforced by the service
pub async fn update_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(input): Json<UpdateUserInput>,
) -> AppResult<Json<User>> {
    let user = UserService::new(state.db)
        .update(&current_user.0, user_id, input)
        .await?;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_role(&current_user.0, ADMIN_ONLY)?;
    UserService::new(state.db).remove(&current_user.0, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
