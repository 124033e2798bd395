use std::sync::Arc;

use anyhow::{Context, Result};
use shared::{init_tracing, load_service_config};
use tracing::info;

use crate::state::AppState;

mod charts;
mod config;
mod datasets;
mod error;
mod routes;
mod state;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing!()?;
    let config = load_service_config!()?;

    let state = Arc::new(AppState::new(config.report));
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Report dashboard listening");
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
