use anyhow::Result;
use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::directory::{InMemoryUserStore, PgUserStore, UserStore};
use crate::security::{AuthProvider, JwtManager, LocalJwtAuthProvider, RolePermissions};
use crate::shared::utils::DbPool;
use crate::tickets::{
    InMemoryTicketStore, PgTicketStore, TicketAccessPolicy, TicketService, TicketStore,
};

/// Everything a request handler can reach. Built once at startup and shared
/// behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// `None` when running on the in-memory stores.
    pub conn: Option<DbPool>,
    pub users: Arc<dyn UserStore>,
    pub tickets: Arc<TicketService>,
    pub jwt: Arc<JwtManager>,
    pub auth_provider: Arc<dyn AuthProvider>,
    pub permissions: Arc<RolePermissions>,
}

impl AppState {
    /// Picks the Postgres stores when a pool is given, the in-memory ones
    /// otherwise.
    pub fn new(config: AppConfig, conn: Option<DbPool>) -> Result<Self> {
        let (users, tickets): (Arc<dyn UserStore>, Arc<dyn TicketStore>) = match &conn {
            Some(pool) => (
                Arc::new(PgUserStore::new(pool.clone())),
                Arc::new(PgTicketStore::new(pool.clone())),
            ),
            None => (
                Arc::new(InMemoryUserStore::new()),
                Arc::new(InMemoryTicketStore::new()),
            ),
        };
        Self::with_stores(config, conn, users, tickets)
    }

    pub fn with_stores(
        config: AppConfig,
        conn: Option<DbPool>,
        users: Arc<dyn UserStore>,
        tickets: Arc<dyn TicketStore>,
    ) -> Result<Self> {
        let jwt = Arc::new(JwtManager::from_auth_config(&config.auth)?);
        let permissions = Arc::new(config.policy.role_permissions.clone());
        let policy = Arc::new(TicketAccessPolicy::from_config(
            &config.policy,
            Arc::clone(&permissions),
        ));
        let service = Arc::new(TicketService::new(
            tickets,
            Arc::clone(&users),
            policy,
            config.policy.validate_assignee_role,
        ));
        let auth_provider: Arc<dyn AuthProvider> = Arc::new(LocalJwtAuthProvider::new(
            Arc::clone(&jwt),
            Arc::clone(&users),
        ));

        Ok(Self {
            config: Arc::new(config),
            conn,
            users,
            tickets: service,
            jwt,
            auth_provider,
            permissions,
        })
    }
}
