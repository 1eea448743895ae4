pub mod auth;
pub mod auth_api;
pub mod auth_provider;
pub mod cors;
pub mod jwt;
pub mod password;

pub use auth::{
    auth_middleware, require_permission, AuthError, AuthMiddlewareState, AuthenticatedUser,
    Permission, Role, RolePermissions,
};
pub use auth_provider::{AuthProvider, LocalJwtAuthProvider};
pub use cors::create_cors_layer;
pub use jwt::{extract_bearer_token, Claims, IssuedToken, JwtConfig, JwtManager};
pub use password::{check_password_policy, hash_password, verify_password, Argon2Config, PasswordHasher2};
