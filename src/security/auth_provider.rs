use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::directory::UserStore;
use crate::security::auth::{AuthError, AuthenticatedUser};
use crate::security::jwt::{is_expired_error, JwtManager};

/// Resolves a bearer credential to the caller identity. Invoked once per
/// request before any ticket policy is consulted.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}

/// Verifies locally issued JWTs, then loads the account so that role and
/// active flag always reflect the user store rather than the token.
pub struct LocalJwtAuthProvider {
    jwt_manager: Arc<JwtManager>,
    users: Arc<dyn UserStore>,
}

impl LocalJwtAuthProvider {
    pub fn new(jwt_manager: Arc<JwtManager>, users: Arc<dyn UserStore>) -> Self {
        Self { jwt_manager, users }
    }
}

#[async_trait]
impl AuthProvider for LocalJwtAuthProvider {
    fn name(&self) -> &str {
        "local-jwt"
    }

    async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let user_id = match self.jwt_manager.validate_access_token(token) {
            Ok(claims) => claims.sub,
            Err(e) if is_expired_error(&e) => return Err(AuthError::ExpiredToken),
            Err(e) => {
                debug!("Bearer token rejected: {e}");
                return Err(AuthError::InvalidToken);
            }
        };

        let Some(user) = self
            .users
            .find_by_id(user_id)
            .await
            .map_err(|e| AuthError::InternalError(e.to_string()))?
        else {
            debug!("Token subject {user_id} no longer exists");
            return Err(AuthError::UserNotFound);
        };

        if !user.is_active {
            warn!("Rejected token for disabled account {user_id}");
            return Err(AuthError::AccountDisabled);
        }

        Ok(AuthenticatedUser::new(user.id, user.username, user.role).with_email(user.email))
    }
}
