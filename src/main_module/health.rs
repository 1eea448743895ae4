//! Liveness endpoint

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use log::warn;
use std::sync::Arc;

use crate::core::shared::state::AppState;

async fn database_status(state: &AppState) -> &'static str {
    let Some(pool) = state.conn.clone() else {
        return "in-memory";
    };
    match tokio::task::spawn_blocking(move || pool.get().map(|_| ())).await {
        Ok(Ok(())) => "connected",
        Ok(Err(e)) => {
            warn!("Health check could not reach the database: {e}");
            "unavailable"
        }
        Err(e) => {
            warn!("Health check task failed: {e}");
            "unavailable"
        }
    }
}

pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let database = database_status(&state).await;
    let (code, status) = if database == "unavailable" {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };

    (
        code,
        Json(serde_json::json!({
            "status": status,
            "service": "helpdesk",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": Utc::now(),
            "database": database
        })),
    )
}
