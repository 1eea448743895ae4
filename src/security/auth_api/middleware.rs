use super::{
    error::AuthError,
    types::{AuthenticatedUser, Permission, RolePermissions},
};
use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::security::auth_provider::AuthProvider;
use crate::security::jwt::extract_bearer_token;

#[derive(Clone)]
pub struct AuthMiddlewareState {
    pub provider: Arc<dyn AuthProvider>,
}

impl AuthMiddlewareState {
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self { provider }
    }
}

/// Resolves the bearer token on every protected route and stores the
/// caller in the request extensions. Requests without a usable token stop
/// here with 401.
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
        .map(str::to_string)
        .ok_or(AuthError::MissingToken)?;

    let user = state.provider.authenticate(&token).await.map_err(|e| {
        info!(
            "Rejected {} {}: {}",
            request.method(),
            request.uri().path(),
            e.error_code()
        );
        e
    })?;

    debug!(
        "Authenticated user={} role={} via {}",
        user.username,
        user.role,
        state.provider.name()
    );
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

pub fn require_permission(
    user: &AuthenticatedUser,
    table: &RolePermissions,
    permission: Permission,
) -> Result<(), AuthError> {
    if user.has_permission(table, permission) {
        Ok(())
    } else {
        Err(AuthError::InsufficientPermissions)
    }
}
