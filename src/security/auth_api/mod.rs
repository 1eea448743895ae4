//! Caller identity, roles and the role-permission table.

pub mod error;
pub mod middleware;
pub mod tests;
pub mod types;

pub use error::AuthError;
pub use middleware::{auth_middleware, require_permission, AuthMiddlewareState};
pub use types::{AuthenticatedUser, Permission, Role, RolePermissions};
