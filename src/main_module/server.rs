//! HTTP server initialization and routing

use axum::{middleware, routing::get, Router};
use log::{error, info};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::core::shared::state::AppState;
use crate::directory::{configure_directory_routes, configure_public_routes};
use crate::security::{auth_middleware, create_cors_layer, AuthMiddlewareState};
use crate::tickets::configure_tickets_routes;

use super::{health_check, shutdown_signal};

/// Health, register and login are open; every other route requires a
/// bearer token.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let auth_state = AuthMiddlewareState::new(Arc::clone(&app_state.auth_provider));

    let protected = Router::new()
        .merge(configure_tickets_routes())
        .merge(configure_directory_routes())
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware));

    let public = Router::new()
        .route("/api/health", get(health_check))
        .merge(configure_public_routes());

    let cors = create_cors_layer(&app_state.config.server.cors_origins);

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_axum_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let addr = app_state.config.bind_address();
    let app = build_router(app_state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {addr}: {e} - is another instance running?");
            return Err(e);
        }
    };
    info!("HTTP server listening on {addr}");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)
}
