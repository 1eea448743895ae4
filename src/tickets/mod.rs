//! Help-desk tickets: access policy, lifecycle rules, list visibility and
//! the HTTP handlers that tie them to a store.

pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod policy;
pub mod query;
pub mod service;
pub mod storage;
pub mod types;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::shared::state::AppState;

pub use error::TicketsError;
pub use handlers::*;
pub use policy::{DeletePolicy, TicketAccessPolicy, UpdateDecision, UpdatePolicy};
pub use query::{build_list_filter, TicketFilter};
pub use service::TicketService;
pub use storage::{InMemoryTicketStore, PgTicketStore, TicketStore};
pub use types::*;

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/tickets",
            get(handle_list_tickets).post(handle_create_ticket),
        )
        .route("/api/tickets/stats", get(handle_ticket_stats))
        .route(
            "/api/tickets/:id",
            get(handle_get_ticket)
                .put(handle_update_ticket)
                .delete(handle_delete_ticket),
        )
}
