use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::security::AuthenticatedUser;

use super::error::TicketsError;
use super::policy::TicketAccessPolicy;
use super::types::{
    parse_priority, validate_description, validate_title, CreateTicketRequest, Ticket,
    TicketComment, TicketField, TicketPriority, TicketStatus, TicketUpdate,
};

/// Builds a new open, unassigned ticket owned by the caller.
pub fn create_ticket(
    caller: &AuthenticatedUser,
    req: CreateTicketRequest,
    now: DateTime<Utc>,
) -> Result<Ticket, TicketsError> {
    let title = validate_title(req.title.as_deref().unwrap_or_default())?;
    let description = validate_description(req.description.as_deref().unwrap_or_default())?;
    let priority = match req.priority.as_deref() {
        Some(raw) => parse_priority(raw)?,
        None => TicketPriority::default(),
    };

    Ok(Ticket {
        id: Uuid::new_v4(),
        title,
        description,
        status: TicketStatus::Open,
        priority,
        created_by: caller.user_id,
        assigned_to: None,
        comments: Vec::new(),
        version: 1,
        created_at: now,
        updated_at: now,
    })
}

/// Applies `update` to `ticket` on behalf of `caller` and returns the new
/// state. The input ticket is left untouched; persisting is the caller's
/// job. Requested fields the caller is not granted are skipped.
pub fn apply_update(
    policy: &TicketAccessPolicy,
    caller: &AuthenticatedUser,
    ticket: &Ticket,
    update: &TicketUpdate,
    now: DateTime<Utc>,
) -> Result<Ticket, TicketsError> {
    let decision = policy.can_update(caller, ticket, &update.requested_fields());
    if !decision.allowed {
        return Err(TicketsError::Forbidden(
            "Not authorized to update this ticket".into(),
        ));
    }

    let mut next = ticket.clone();

    if let Some(assignee) = update.assigned_to {
        if decision.grants(TicketField::AssignedTo) {
            next.assigned_to = Some(assignee);
            match update.status {
                Some(status) if status.is_claimable() => next.status = status,
                _ if ticket.status == TicketStatus::Open => next.status = TicketStatus::InProgress,
                _ => {}
            }
        }
    }

    if decision.grants(TicketField::Title) {
        if let Some(title) = &update.title {
            next.title = title.clone();
        }
    }
    if decision.grants(TicketField::Description) {
        if let Some(description) = &update.description {
            next.description = description.clone();
        }
    }

    if decision.grants(TicketField::Status) {
        if let Some(status) = update.status {
            next.status = status;
        }
    }
    if decision.grants(TicketField::Priority) {
        if let Some(priority) = update.priority {
            next.priority = priority;
        }
    }

    if let Some(text) = update.comment.as_deref().filter(|t| !t.trim().is_empty()) {
        next.comments.push(TicketComment {
            id: Uuid::new_v4(),
            text: text.to_string(),
            posted_by: caller.user_id,
            created_at: now,
        });
    }

    if next != *ticket {
        next.updated_at = now;
    }
    Ok(next)
}
