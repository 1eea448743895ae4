use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::error;

use crate::security::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0} already in use")]
    Duplicate(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Forbidden(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl DirectoryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::Duplicate(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Duplicate(_) => "duplicate",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Forbidden(_) => "forbidden",
            Self::Storage(_) => "storage",
        }
    }
}

impl From<AuthError> for DirectoryError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InternalError(msg) => Self::Storage(msg),
            other => Self::Forbidden(other.message()),
        }
    }
}

impl From<JsonRejection> for DirectoryError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for DirectoryError {
    fn from(_: PathRejection) -> Self {
        Self::Validation("Invalid user id".into())
    }
}

impl IntoResponse for DirectoryError {
    fn into_response(self) -> axum::response::Response {
        let message = match &self {
            Self::Storage(detail) => {
                error!("Directory storage failure: {detail}");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };
        (
            self.status_code(),
            Json(serde_json::json!({ "error": self.error_code(), "message": message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn respond_logged(err: impl IntoResponse) -> (axum::response::Response, String) {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let response = tracing::subscriber::with_default(subscriber, || err.into_response());
        let logs = String::from_utf8(captured.0.lock().expect("lock").clone()).expect("utf8");
        (response, logs)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn test_storage_detail_is_logged_not_returned() {
        let (response, logs) =
            respond_logged(DirectoryError::Storage("users table is locked".into()));

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(logs.contains("users table is locked"));
        let body = body_json(response).await;
        assert_eq!(body["error"], "storage");
        assert!(!body["message"]
            .as_str()
            .expect("message")
            .contains("locked"));
    }

    #[tokio::test]
    async fn test_identity_lookup_failure_is_logged_not_returned() {
        let (response, logs) = respond_logged(AuthError::InternalError("pool timed out".into()));

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(logs.contains("pool timed out"));
        let body = body_json(response).await;
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["message"], "An internal error occurred");
    }

    #[test]
    fn test_duplicate_message() {
        let err = DirectoryError::Duplicate("Email".into());
        assert_eq!(err.to_string(), "Email already in use");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
