//! Who may view, update and delete a ticket.
//!
//! Decisions are pure: they read the caller, the role-permission table and
//! the ticket as currently stored, and never mutate anything.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::core::config::TicketPolicyConfig;
use crate::security::{AuthenticatedUser, Permission, RolePermissions};

use super::types::{Ticket, TicketField, TicketStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    #[default]
    AdminOnly,
    AdminOrCreator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Admin, creator, assignee, or a staff member claiming the ticket.
    #[default]
    Relationship,
    /// Only holders of `manage_tickets` or `assign`.
    StaffOnly,
}

/// One way of satisfying a field rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Permission(Permission),
    Creator,
    Assignee,
    /// Passing the overall update gate is enough.
    Gate,
}

pub const FIELD_RULES: &[(TicketField, &[Grant])] = &[
    (TicketField::AssignedTo, &[Grant::Permission(Permission::Assign)]),
    (
        TicketField::Title,
        &[Grant::Permission(Permission::ManageTickets), Grant::Creator],
    ),
    (
        TicketField::Description,
        &[Grant::Permission(Permission::ManageTickets), Grant::Creator],
    ),
    (
        TicketField::Status,
        &[
            Grant::Permission(Permission::ManageTickets),
            Grant::Creator,
            Grant::Assignee,
        ],
    ),
    (
        TicketField::Priority,
        &[
            Grant::Permission(Permission::ManageTickets),
            Grant::Creator,
            Grant::Assignee,
        ],
    ),
    (TicketField::Comment, &[Grant::Gate]),
];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateDecision {
    pub allowed: bool,
    /// Requested fields the caller may change. Empty when not allowed.
    pub granted: BTreeSet<TicketField>,
}

impl UpdateDecision {
    pub fn denied() -> Self {
        Self::default()
    }

    pub fn grants(&self, field: TicketField) -> bool {
        self.granted.contains(&field)
    }
}

#[derive(Debug, Clone)]
pub struct TicketAccessPolicy {
    permissions: Arc<RolePermissions>,
    delete: DeletePolicy,
    update: UpdatePolicy,
}

impl TicketAccessPolicy {
    pub fn new(permissions: Arc<RolePermissions>, delete: DeletePolicy, update: UpdatePolicy) -> Self {
        Self {
            permissions,
            delete,
            update,
        }
    }

    pub fn from_config(config: &TicketPolicyConfig, permissions: Arc<RolePermissions>) -> Self {
        Self::new(permissions, config.delete, config.update)
    }

    pub fn permissions(&self) -> &RolePermissions {
        &self.permissions
    }

    fn has(&self, caller: &AuthenticatedUser, permission: Permission) -> bool {
        caller.has_permission(&self.permissions, permission)
    }

    pub fn can_create(&self, caller: &AuthenticatedUser) -> bool {
        self.has(caller, Permission::Create)
    }

    pub fn can_view(&self, caller: &AuthenticatedUser, ticket: &Ticket) -> bool {
        self.has(caller, Permission::ManageTickets)
            || ticket.is_creator(caller.user_id)
            || ticket.is_assignee(caller.user_id)
            || (self.has(caller, Permission::Triage) && ticket.status == TicketStatus::Open)
    }

    fn passes_gate(
        &self,
        caller: &AuthenticatedUser,
        ticket: &Ticket,
        requested: &BTreeSet<TicketField>,
    ) -> bool {
        match self.update {
            UpdatePolicy::Relationship => {
                self.has(caller, Permission::ManageTickets)
                    || ticket.is_creator(caller.user_id)
                    || ticket.is_assignee(caller.user_id)
                    || (self.has(caller, Permission::Assign)
                        && requested.contains(&TicketField::AssignedTo))
            }
            UpdatePolicy::StaffOnly => {
                self.has(caller, Permission::ManageTickets) || self.has(caller, Permission::Assign)
            }
        }
    }

    fn satisfies(&self, grant: Grant, caller: &AuthenticatedUser, ticket: &Ticket) -> bool {
        match grant {
            Grant::Permission(permission) => self.has(caller, permission),
            Grant::Creator => ticket.is_creator(caller.user_id),
            Grant::Assignee => ticket.is_assignee(caller.user_id),
            Grant::Gate => true,
        }
    }

    pub fn can_update(
        &self,
        caller: &AuthenticatedUser,
        ticket: &Ticket,
        requested: &BTreeSet<TicketField>,
    ) -> UpdateDecision {
        if !self.passes_gate(caller, ticket, requested) {
            return UpdateDecision::denied();
        }

        let granted = FIELD_RULES
            .iter()
            .filter(|(field, _)| requested.contains(field))
            .filter(|(_, grants)| grants.iter().any(|g| self.satisfies(*g, caller, ticket)))
            .map(|(field, _)| *field)
            .collect();

        UpdateDecision {
            allowed: true,
            granted,
        }
    }

    pub fn can_delete(&self, caller: &AuthenticatedUser, ticket: &Ticket) -> bool {
        match self.delete {
            DeletePolicy::AdminOnly => self.has(caller, Permission::Delete),
            DeletePolicy::AdminOrCreator => {
                self.has(caller, Permission::Delete) || ticket.is_creator(caller.user_id)
            }
        }
    }
}
