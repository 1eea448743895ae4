use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::security::{check_password_policy, hash_password, verify_password, AuthenticatedUser, Role};
use crate::shared::state::AppState;

use super::error::DirectoryError;
use super::types::{
    normalize_email, normalize_username, AuthResponse, LoginRequest, RegisterRequest,
    UpdateProfileRequest, User, UserResponse,
};

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub(crate) async fn hash_in_background(password: String) -> Result<String, DirectoryError> {
    if let Some(reason) = check_password_policy(&password) {
        return Err(DirectoryError::Validation(reason));
    }
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e: tokio::task::JoinError| DirectoryError::Storage(e.to_string()))?
        .map_err(|e| DirectoryError::Storage(e.to_string()))
}

async fn verify_in_background(password: String, hash: String) -> Result<bool, DirectoryError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e: tokio::task::JoinError| DirectoryError::Storage(e.to_string()))?
        .map_err(|e| DirectoryError::Storage(e.to_string()))
}

pub(crate) fn issue_for(state: &AppState, user: &User) -> Result<AuthResponse, DirectoryError> {
    let issued = state
        .jwt
        .issue(user.id, &user.username)
        .map_err(|e| DirectoryError::Storage(e.to_string()))?;
    Ok(AuthResponse::new(user, issued))
}

/// Rejects a username or email that another account already holds.
pub(crate) async fn ensure_available(
    state: &AppState,
    user_id: Option<uuid::Uuid>,
    username: Option<&str>,
    email: Option<&str>,
) -> Result<(), DirectoryError> {
    if let Some(email) = email {
        if let Some(existing) = state.users.find_by_email(email).await? {
            if Some(existing.id) != user_id {
                return Err(DirectoryError::Duplicate("Email".into()));
            }
        }
    }
    if let Some(username) = username {
        if let Some(existing) = state.users.find_by_username(username).await? {
            if Some(existing.id) != user_id {
                return Err(DirectoryError::Duplicate("Username".into()));
            }
        }
    }
    Ok(())
}

/// Validates and hashes a new account. Shared by self-registration and
/// the admin create route.
pub(crate) async fn build_account(
    state: &AppState,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Result<User, DirectoryError> {
    let (Some(username), Some(email)) = (non_empty(Some(username)), non_empty(Some(email))) else {
        return Err(DirectoryError::Validation(
            "Please provide all required fields".into(),
        ));
    };
    if password.is_empty() {
        return Err(DirectoryError::Validation(
            "Please provide all required fields".into(),
        ));
    }

    let username = normalize_username(username).map_err(DirectoryError::Validation)?;
    let email = normalize_email(email).map_err(DirectoryError::Validation)?;
    ensure_available(state, None, Some(&username), Some(&email)).await?;

    let password_hash = hash_in_background(password.to_string()).await?;
    Ok(User::new(username, email, password_hash, role))
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    req: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), DirectoryError> {
    let Json(req) = req?;
    let user = build_account(&state, &req.username, &req.email, &req.password, Role::User).await?;
    let user = state.users.insert(user).await?;

    info!("Registered user {} ({})", user.username, user.id);
    Ok((StatusCode::CREATED, Json(issue_for(&state, &user)?)))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    req: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, DirectoryError> {
    let Json(req) = req?;
    let Some(email) = non_empty(Some(&req.email)) else {
        return Err(DirectoryError::Validation(
            "Please provide email and password".into(),
        ));
    };
    if req.password.is_empty() {
        return Err(DirectoryError::Validation(
            "Please provide email and password".into(),
        ));
    }

    let email = email.to_lowercase();
    let Some(mut user) = state.users.find_by_email(&email).await? else {
        info!("Login failed: unknown email");
        return Err(DirectoryError::InvalidCredentials);
    };

    if !verify_in_background(req.password, user.password_hash.clone()).await? {
        info!("Login failed for user {}", user.id);
        return Err(DirectoryError::InvalidCredentials);
    }

    if !user.is_active {
        warn!("Login refused for disabled account {}", user.id);
        return Err(DirectoryError::Forbidden(
            "Your account has been disabled".into(),
        ));
    }

    user.last_login = Some(Utc::now());
    let user = state.users.save(user).await?;

    info!("User {} logged in", user.id);
    Ok(Json(issue_for(&state, &user)?))
}

pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
) -> Result<Json<UserResponse>, DirectoryError> {
    let user = state
        .users
        .find_by_id(caller.user_id)
        .await?
        .ok_or_else(|| DirectoryError::NotFound("User not found".into()))?;
    Ok(Json(user.into()))
}

pub async fn update_current_user(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    req: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, DirectoryError> {
    let Json(req) = req?;
    let mut user = state
        .users
        .find_by_id(caller.user_id)
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
    if let Some(password) = req.password.filter(|p| !p.is_empty()) {
        user.password_hash = hash_in_background(password).await?;
    }
    user.updated_at = Utc::now();

    let user = state.users.save(user).await?;
    info!("User {} updated their profile", user.id);
    Ok(Json(issue_for(&state, &user)?))
}
