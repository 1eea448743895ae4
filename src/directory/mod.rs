//! Accounts: self-service registration and login, the caller's own
//! profile, and user administration.

pub mod auth_routes;
pub mod error;
pub mod storage;
pub mod types;
pub mod users;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::shared::state::AppState;

pub use error::DirectoryError;
pub use storage::{InMemoryUserStore, PgUserStore, UserStore};
pub use types::{User, UserResponse};

/// Routes reachable without a token.
pub fn configure_public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register", post(auth_routes::register))
        .route("/api/auth/login", post(auth_routes::login))
}

pub fn configure_directory_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/auth/me",
            get(auth_routes::get_current_user).put(auth_routes::update_current_user),
        )
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route("/api/users/agents", get(users::list_agents))
        .route(
            "/api/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
}
