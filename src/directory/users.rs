use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::security::{require_permission, AuthenticatedUser, Permission, Role};
use crate::shared::state::AppState;

use super::auth_routes::{build_account, ensure_available, non_empty};
use super::error::DirectoryError;
use super::types::{
    normalize_email, normalize_username, CreateUserRequest, MessageResponse, UpdateUserRequest,
    UserResponse,
};

fn require_admin(state: &AppState, caller: &AuthenticatedUser) -> Result<(), DirectoryError> {
    require_permission(caller, &state.permissions, Permission::ManageUsers)?;
    Ok(())
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
) -> Result<Json<Vec<UserResponse>>, DirectoryError> {
    require_admin(&state, &caller)?;
    let users = state.users.find_all().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn list_agents(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
) -> Result<Json<Vec<UserResponse>>, DirectoryError> {
    require_admin(&state, &caller)?;
    let agents = state.users.find_by_role(Role::Agent).await?;
    Ok(Json(agents.into_iter().map(UserResponse::from).collect()))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    req: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), DirectoryError> {
    require_admin(&state, &caller)?;
    let Json(req) = req?;

    let role = req.role.unwrap_or_default();
    let user = build_account(&state, &req.username, &req.email, &req.password, role).await?;
    let user = state.users.insert(user).await?;

    info!("Admin {} created user {} as {}", caller.user_id, user.id, user.role);
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<UserResponse>, DirectoryError> {
    require_admin(&state, &caller)?;
    let Path(id) = id?;
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| DirectoryError::NotFound("User not found".into()))?;
    Ok(Json(user.into()))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    id: Result<Path<Uuid>, PathRejection>,
    req: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, DirectoryError> {
    require_admin(&state, &caller)?;
    let Path(id) = id?;
    let Json(req) = req?;

    let mut user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| DirectoryError::NotFound("User not found".into()))?;

    let username = non_empty(req.username.as_deref())
        .map(normalize_username)
        .transpose()
        .map_err(DirectoryError::Validation)?;
    let email = non_empty(req.email.as_deref())
        .map(normalize_email)
        .transpose()
        .map_err(DirectoryError::Validation)?;
    ensure_available(&state, Some(user.id), username.as_deref(), email.as_deref()).await?;

    if let Some(username) = username {
        user.username = username;
    }
    if let Some(email) = email {
        user.email = email;
    }
    if let Some(role) = req.role {
        user.role = role;
    }
    if let Some(is_active) = req.is_active {
        user.is_active = is_active;
    }
    user.updated_at = Utc::now();

    let user = state.users.save(user).await?;
    info!("Admin {} updated user {}", caller.user_id, user.id);
    Ok(Json(user.into()))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<MessageResponse>, DirectoryError> {
    require_admin(&state, &caller)?;
    let Path(id) = id?;

    if !state.users.delete_by_id(id).await? {
        return Err(DirectoryError::NotFound("User not found".into()));
    }

    info!("Admin {} removed user {id}", caller.user_id);
    Ok(Json(MessageResponse {
        message: "User removed".into(),
    }))
}
