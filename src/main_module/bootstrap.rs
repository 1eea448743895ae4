//! Process startup: configuration, database and shared state.

use anyhow::Result;
use log::{info, warn};
use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{create_conn, redact_database_url, run_migrations, DbPool};

pub fn init_database(config: &AppConfig) -> Result<Option<DbPool>> {
    let Some(url) = config.database.url.as_deref() else {
        warn!("No database URL configured, using in-memory stores; data is lost on restart");
        return Ok(None);
    };

    info!("Connecting to {}", redact_database_url(url));
    let pool = create_conn(&config.database)?;

    if let Some(pool) = &pool {
        if config.database.run_migrations {
            let applied = run_migrations(pool)?;
            info!("Database ready, {applied} migration(s) applied");
        }
    }
    Ok(pool)
}

pub fn build_app_state(config: AppConfig) -> Result<Arc<AppState>> {
    if config.auth.uses_dev_secret() {
        warn!("JWT secret not set, using the development secret - DO NOT USE IN PRODUCTION");
    }
    let pool = init_database(&config)?;
    Ok(Arc::new(AppState::new(config, pool)?))
}
