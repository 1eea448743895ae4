use dotenvy::dotenv;
use log::{error, info};
use tracing_subscriber::EnvFilter;

use helpdesk::core::config::AppConfig;
use helpdesk::main_module::{build_app_state, run_axum_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    info!(
        "Starting helpdesk {} (delete policy {:?}, update policy {:?})",
        env!("CARGO_PKG_VERSION"),
        config.policy.delete,
        config.policy.update
    );

    let state = build_app_state(config)?;

    if let Err(e) = run_axum_server(state).await {
        error!("Server stopped with error: {e}");
        return Err(e.into());
    }
    info!("Server stopped");
    Ok(())
}
