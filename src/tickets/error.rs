use axum::{
    extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse, Json,
};

use tracing::error;

use crate::directory::DirectoryError;
use crate::security::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum TicketsError {
    #[error("Not authorized")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl TicketsError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::Storage(_) => "storage",
        }
    }

    pub(crate) fn ticket_not_found() -> Self {
        Self::NotFound("Ticket not found".into())
    }
}

impl From<DirectoryError> for TicketsError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Storage(msg) => Self::Storage(msg),
            DirectoryError::NotFound(msg) => Self::NotFound(msg),
            DirectoryError::Forbidden(msg) => Self::Forbidden(msg),
            other => Self::Validation(other.to_string()),
        }
    }
}

impl From<JsonRejection> for TicketsError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<diesel::result::Error> for TicketsError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<AuthError> for TicketsError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::ExpiredToken
            | AuthError::UserNotFound => Self::Unauthenticated,
            AuthError::InsufficientPermissions | AuthError::AccountDisabled => {
                Self::Forbidden(err.message())
            }
            AuthError::InternalError(msg) => Self::Storage(msg),
        }
    }
}

impl IntoResponse for TicketsError {
    fn into_response(self) -> axum::response::Response {
        let message = match &self {
            Self::Storage(detail) => {
                error!("Ticket storage failure: {detail}");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };
        (
            self.status_code(),
            Json(serde_json::json!({ "error": self.kind(), "message": message })),
        )
            .into_response()
    }
}
