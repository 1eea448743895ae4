use anyhow::{anyhow, Result};
use diesel::{
    r2d2::{ConnectionManager, Pool},
    PgConnection,
};

use crate::core::config::DatabaseConfig;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn create_conn(config: &DatabaseConfig) -> Result<Option<DbPool>> {
    let Some(database_url) = config.url.as_deref() else {
        return Ok(None);
    };
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(config.max_connections)
        .build(manager)
        .map_err(|e| anyhow!("Database pool creation failed: {e}"))?;
    Ok(Some(pool))
}

/// Run database migrations
pub fn run_migrations(pool: &DbPool) -> Result<usize> {
    use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

    const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

    let mut conn = pool.get()?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!("Migration error: {e}"))?;
    Ok(applied.len())
}

/// Hides the password portion of a postgres URL before it reaches the logs.
pub fn redact_database_url(url: &str) -> String {
    let Some(stripped) = url
        .strip_prefix("postgres://")
        .or_else(|| url.strip_prefix("postgresql://"))
    else {
        return url.to_string();
    };
    match stripped.split_once('@') {
        Some((credentials, host)) => {
            let user = credentials.split(':').next().unwrap_or_default();
            format!("postgres://{user}:***@{host}")
        }
        None => format!("postgres://{stripped}"),
    }
}
