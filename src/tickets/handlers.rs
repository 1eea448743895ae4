use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::security::AuthenticatedUser;
use crate::shared::state::AppState;

use super::error::TicketsError;
use super::types::{
    CreateTicketRequest, DeleteTicketResponse, Ticket, TicketStats, UpdateTicketRequest,
};

fn parse_ticket_id(raw: &str) -> Result<Uuid, TicketsError> {
    Uuid::parse_str(raw).map_err(|_| TicketsError::Validation(format!("Invalid ticket id: {raw}")))
}

pub async fn handle_create_ticket(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    req: Result<Json<CreateTicketRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Ticket>), TicketsError> {
    let Json(req) = req?;
    let ticket = state.tickets.create(&caller, req).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn handle_list_tickets(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
) -> Result<Json<Vec<Ticket>>, TicketsError> {
    Ok(Json(state.tickets.list(&caller).await?))
}

pub async fn handle_ticket_stats(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
) -> Result<Json<TicketStats>, TicketsError> {
    Ok(Json(state.tickets.stats(&caller).await?))
}

pub async fn handle_get_ticket(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<Ticket>, TicketsError> {
    let id = parse_ticket_id(&id)?;
    Ok(Json(state.tickets.get(&caller, id).await?))
}

pub async fn handle_update_ticket(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
    req: Result<Json<UpdateTicketRequest>, JsonRejection>,
) -> Result<Json<Ticket>, TicketsError> {
    let id = parse_ticket_id(&id)?;
    let Json(req) = req?;
    Ok(Json(state.tickets.update(&caller, id, req).await?))
}

pub async fn handle_delete_ticket(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteTicketResponse>, TicketsError> {
    let id = parse_ticket_id(&id)?;
    state.tickets.delete(&caller, id).await?;
    Ok(Json(DeleteTicketResponse {
        message: "Ticket removed".into(),
        id,
    }))
}
