//! Consulting report HTTP server
//!
//! Loads configuration from the environment, opens the database and serves
//! the JSON API on `BIND_ADDR`.

use anyhow::{Context, Result};
use consulting_report::{
    web::{router, AppState},
    AccessControl, AppConfig, OpenAiGenerator, PdfRenderer, ReportService, Store,
};
use log::info;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    let store = Store::open(&config.database_path)
        .with_context(|| format!("Failed to open database: {}", config.database_path.display()))?;

    let access = AccessControl::new(
        store.clone(),
        &config.admin_email,
        config.admin_bootstrap_key.clone(),
    );
    let generator = OpenAiGenerator::from_config(&config).context("Failed to build HTTP client")?;
    info!("narrative model: {}", generator.model());

    let renderer = PdfRenderer::from_config(&config).context("Failed to load report font")?;

    let service = ReportService::new(store, access, Arc::new(generator), Arc::new(renderer));
    let app = router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
