use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tracing::info;

use zeus::app;
use zeus::config::settings::AppConfig;
use zeus::infrastructure::redis::store::RedisJobStore;
use zeus::shutdown::install_shutdown_handler;
use zeus::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    zeus::init_tracing();

    info!("Starting server...");

    let config = AppConfig::from_env().context("invalid configuration")?;
    let store = RedisJobStore::connect(&config.store)
        .await
        .context("failed to connect to the job store")?;

    let state = AppState::new(&config, Arc::new(store));
    let app = app::create_app(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server {} running on http://{}", config.instance_id, addr);

    let shutdown = install_shutdown_handler();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}
