use uuid::Uuid;

use crate::security::{AuthenticatedUser, Permission, RolePermissions};

use super::types::{Ticket, TicketStatus};

/// Visibility filter for ticket listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketFilter {
    All,
    /// Assigned to the user, or still open.
    AssignedOrOpen(Uuid),
    CreatedBy(Uuid),
}

impl TicketFilter {
    pub fn matches(&self, ticket: &Ticket) -> bool {
        match self {
            Self::All => true,
            Self::AssignedOrOpen(user_id) => {
                ticket.assigned_to == Some(*user_id) || ticket.status == TicketStatus::Open
            }
            Self::CreatedBy(user_id) => ticket.created_by == *user_id,
        }
    }
}

pub fn build_list_filter(permissions: &RolePermissions, caller: &AuthenticatedUser) -> TicketFilter {
    if caller.has_permission(permissions, Permission::ManageTickets) {
        TicketFilter::All
    } else if caller.has_permission(permissions, Permission::Triage) {
        TicketFilter::AssignedOrOpen(caller.user_id)
    } else {
        TicketFilter::CreatedBy(caller.user_id)
    }
}

/// Newest first. Listings always come back in this order.
pub fn sort_newest_first(tickets: &mut [Ticket]) {
    tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
