// HTTP API server binary for gameshelf

use anyhow::Result;
use gameshelf::api::{ApiServer, AppState};
use gameshelf::env_boot;
use gameshelf::util::env as env_util;
use gameshelf::util::logging::{init_tracing, DEFAULT_FILTER};

#[actix_web::main]
async fn main() -> Result<()> {
    env_util::init_env();
    init_tracing(DEFAULT_FILTER)?;

    tracing::info!("Initializing gameshelf API server");

    let server = ApiServer::from_env()?;
    let booted = env_boot::boot().await?;

    tracing::info!("Database connected successfully");

    server
        .run(AppState::new(booted.orchestrator, Some(booted.db)))
        .await?;

    Ok(())
}
