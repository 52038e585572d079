//! Shared startup for the binaries: env, database, uploads and the wired orchestrator.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::database_ops::catalog::PgCatalogStore;
use crate::database_ops::db::Db;
use crate::database_ops::uploads::Uploads;
use crate::ingest::config::{IngestConfig, SourceEndpoints};
use crate::ingest::{build_pipeline, build_resolver};
use crate::orchestrator::IngestionOrchestrator;
use crate::util::env::{db_url, env_opt, env_parse, init_env, preflight_check};

pub struct Booted {
    pub db: Db,
    pub orchestrator: IngestionOrchestrator,
}

pub async fn boot() -> Result<Booted> {
    init_env();
    preflight_check(
        "gameshelf",
        &[],
        &[
            "DATABASE_URL",
            "UPLOADS_DIR",
            "WIKI_BASE_URL",
            "STEAM_STORE_URL",
            "IGDB_API_URL",
            "TWITCH_CLIENT_ID",
            "TWITCH_CLIENT_SECRET",
            "INGEST_MAX_IN_FLIGHT",
            "INGEST_BATCH_DEADLINE_SECS",
        ],
    )?;

    let cfg = IngestConfig::from_env();
    let endpoints = SourceEndpoints::from_env();
    if endpoints.twitch_client_id.is_none() {
        info!("TWITCH_CLIENT_ID not set; catalog source will report unavailable");
    }

    let url = db_url()?;
    let max_conns: u32 = env_parse("DB_MAX_CONNS", 10u32);
    let db = Db::connect(&url, max_conns).await?;

    let uploads_dir = env_opt("UPLOADS_DIR").unwrap_or_else(|| "./uploads".to_string());
    let uploads = Uploads::open(&uploads_dir)
        .await
        .with_context(|| format!("failed to open uploads dir {uploads_dir}"))?;

    let resolver = build_resolver(&endpoints, &cfg)?;
    let pipeline = build_pipeline(
        resolver,
        Arc::new(PgCatalogStore::new(db.clone())),
        Arc::new(uploads),
        &endpoints,
        &cfg,
    )?;
    info!(
        max_in_flight = cfg.max_in_flight,
        deadline_secs = cfg.batch_deadline.as_secs(),
        max_batch = cfg.max_batch,
        uploads_dir = %uploads_dir,
        "ingestion pipeline ready"
    );

    Ok(Booted {
        db,
        orchestrator: IngestionOrchestrator::new(pipeline, cfg),
    })
}
