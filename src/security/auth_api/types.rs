use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Create,
    Read,
    Update,
    Delete,
    Assign,
    Triage,
    ManageTickets,
    ManageUsers,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Assign => "assign",
            Self::Triage => "triage",
            Self::ManageTickets => "manage_tickets",
            Self::ManageUsers => "manage_users",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Agent,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Agent => "agent",
            Self::User => "user",
        }
    }

    /// Roles that may hold a ticket assignment.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Admin | Self::Agent)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "agent" => Ok(Self::Agent),
            "user" => Ok(Self::User),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

/// Immutable role → permission-token table, built once from config and
/// shared by the ticket policy and the user-administration routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RolePermissions(BTreeMap<Role, BTreeSet<Permission>>);

impl Default for RolePermissions {
    fn default() -> Self {
        use Permission::*;

        let mut table = BTreeMap::new();
        table.insert(
            Role::Admin,
            BTreeSet::from([
                Create,
                Read,
                Update,
                Delete,
                Assign,
                ManageTickets,
                ManageUsers,
            ]),
        );
        table.insert(
            Role::Agent,
            BTreeSet::from([Create, Read, Update, Assign, Triage]),
        );
        table.insert(Role::User, BTreeSet::from([Create, Read]));
        Self(table)
    }
}

impl RolePermissions {
    pub fn new(table: BTreeMap<Role, BTreeSet<Permission>>) -> Self {
        Self(table)
    }

    pub fn allows(&self, role: Role, permission: Permission) -> bool {
        self.0
            .get(&role)
            .map(|perms| perms.contains(&permission))
            .unwrap_or(false)
    }

    pub fn permissions_for(&self, role: Role) -> BTreeSet<Permission> {
        self.0.get(&role).cloned().unwrap_or_default()
    }
}

/// The caller identity resolved by the identity provider for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn new(user_id: Uuid, username: impl Into<String>, role: Role) -> Self {
        Self {
            user_id,
            username: username.into(),
            email: None,
            role,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn has_permission(&self, table: &RolePermissions, permission: Permission) -> bool {
        table.allows(self.role, permission)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}
