//! Layered application configuration.
//!
//! Sources, lowest precedence first: built-in defaults, `helpdesk.toml`,
//! `HELPDESK_*` environment variables (`__` separates nested keys), and
//! finally the bare `DATABASE_URL`, `JWT_SECRET`, `PORT` and `CORS_ORIGINS`
//! variables read by older deployments.

use anyhow::{anyhow, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::security::RolePermissions;
use crate::tickets::policy::{DeletePolicy, UpdatePolicy};

pub const DEFAULT_CONFIG_FILE: &str = "helpdesk.toml";
pub const ENV_PREFIX: &str = "HELPDESK_";

const DEV_JWT_SECRET: &str = "dev-secret-key-change-in-production-minimum-32-chars";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub policy: TicketPolicyConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Empty means any origin, which suits local development only.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            run_migrations: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    pub token_expiry_minutes: i64,
    pub leeway_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            issuer: "helpdesk".to_string(),
            audience: "helpdesk-api".to_string(),
            token_expiry_minutes: 30 * 24 * 60,
            leeway_seconds: 60,
        }
    }
}

impl AuthConfig {
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TicketPolicyConfig {
    pub delete: DeletePolicy,
    pub update: UpdatePolicy,
    pub validate_assignee_role: bool,
    pub role_permissions: RolePermissions,
}

impl Default for TicketPolicyConfig {
    fn default() -> Self {
        Self {
            delete: DeletePolicy::AdminOnly,
            update: UpdatePolicy::Relationship,
            validate_assignee_role: true,
            role_permissions: RolePermissions::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| anyhow!("Invalid configuration: {e}"))?;

        config.apply_legacy_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_legacy_env(&mut self) {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                self.database.url = Some(url);
            }
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            if !secret.trim().is_empty() {
                self.auth.jwt_secret = secret;
            }
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.len() < 32 {
            return Err(anyhow!("auth.jwt_secret must be at least 32 characters"));
        }
        if self.auth.token_expiry_minutes <= 0 {
            return Err(anyhow!("auth.token_expiry_minutes must be positive"));
        }
        if self.database.max_connections == 0 {
            return Err(anyhow!("database.max_connections must be at least 1"));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
