//! Client handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{ClientStats, PaginatedResponse, ALL_ROLES, MANAGEMENT_ROLES};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_role, CurrentUser};
use crate::services::client::{Client, ClientFilter, CreateClientInput, UpdateClientInput};
use crate::services::ClientService;
use crate::AppState;

pub async fn create_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateClientInput>,
) -> AppResult<(StatusCode, Json<Client>)> {
    require_role(&current_user.0, ALL_ROLES)?;
    let client = ClientService::new(state.db).create(input).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn list_clients(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ClientFilter>,
) -> AppResult<Json<PaginatedResponse<Client>>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let clients = ClientService::new(state.db).list(filter).await?;
    Ok(Json(clients))
}

pub async fn get_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(client_id): Path<Uuid>,
) -> AppResult<Json<Client>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let client = ClientService::new(state.db).get(client_id).await?;
    Ok(Json(client))
}

pub async fn update_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(client_id): Path<Uuid>,
    Json(input): Json<UpdateClientInput>,
) -> AppResult<Json<Client>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let client = ClientService::new(state.db).update(client_id, input).await?;
    Ok(Json(client))
}

pub async fn delete_client(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(client_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_role(&current_user.0, MANAGEMENT_ROLES)?;
    ClientService::new(state.db).remove(client_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Purchase history summary of a client
pub async fn client_stats(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(client_id): Path<Uuid>,
) -> AppResult<Json<ClientStats>> {
    require_role(&current_user.0, ALL_ROLES)?;
    let stats = ClientService::new(state.db).stats(client_id).await?;
    Ok(Json(stats))
}
