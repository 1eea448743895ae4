use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Why a request could not be tied to an active account, or why that
/// account may not proceed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Not authorized, no token")]
    MissingToken,
    #[error("Not authorized, token failed")]
    InvalidToken,
    #[error("Authentication token has expired")]
    ExpiredToken,
    #[error("You don't have permission to access this resource")]
    InsufficientPermissions,
    #[error("Not authorized, user not found")]
    UserNotFound,
    #[error("Your account has been disabled")]
    AccountDisabled,
    #[error("Identity lookup failed: {0}")]
    InternalError(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingToken | Self::InvalidToken | Self::ExpiredToken | Self::UserNotFound => {
                StatusCode::UNAUTHORIZED
            }
            Self::InsufficientPermissions | Self::AccountDisabled => StatusCode::FORBIDDEN,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::InvalidToken => "invalid_token",
            Self::ExpiredToken => "expired_token",
            Self::InsufficientPermissions => "insufficient_permissions",
            Self::UserNotFound => "user_not_found",
            Self::AccountDisabled => "account_disabled",
            Self::InternalError(_) => "internal_error",
        }
    }

    /// Client-facing text. Internal failures never leak their cause.
    pub fn message(&self) -> String {
        match self {
            Self::InternalError(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::InternalError(cause) = &self {
            error!("Authentication aborted: {cause}");
        }
        let body = Json(json!({
            "error": self.error_code(),
            "message": self.message()
        }));
        (self.status_code(), body).into_response()
    }
}
