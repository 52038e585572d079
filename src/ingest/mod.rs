// Bulk game ingestion: sources, per-item pipeline stages and shared models.

pub mod config;
pub mod dedup;
pub mod error;
pub mod http;
pub mod igdb;
pub mod images;
pub mod models;
pub mod persist;
pub mod pipeline;
pub mod resolver;
pub mod steam;
pub mod wiki;

use std::sync::Arc;

use crate::database_ops::catalog::CatalogStore;
use crate::database_ops::uploads::BlobStore;
use config::{IngestConfig, SourceEndpoints};
use dedup::DedupChecker;
use igdb::IgdbSource;
use images::ImageFetcher;
use persist::GamePersister;
use pipeline::ItemPipeline;
use resolver::SourceResolver;
use steam::SteamSource;
use wiki::WikiSource;

/// Resolver with all three live sources sharing one HTTP client.
pub fn build_resolver(
    endpoints: &SourceEndpoints,
    cfg: &IngestConfig,
) -> anyhow::Result<SourceResolver> {
    let client = http::build_client(&endpoints.user_agent, cfg.source_timeout)?;
    Ok(SourceResolver::new()
        .with_source(Arc::new(WikiSource::new(
            client.clone(),
            endpoints.wiki_base_url.clone(),
        )))
        .with_source(Arc::new(SteamSource::new(
            client.clone(),
            endpoints.steam_store_url.clone(),
        )))
        .with_source(Arc::new(IgdbSource::new(
            client,
            Arc::new(endpoints.clone()),
        ))))
}

pub fn build_pipeline(
    resolver: SourceResolver,
    catalog: Arc<dyn CatalogStore>,
    blob: Arc<dyn BlobStore>,
    endpoints: &SourceEndpoints,
    cfg: &IngestConfig,
) -> anyhow::Result<ItemPipeline> {
    let images = ImageFetcher::new(&endpoints.user_agent, cfg.image_timeout, blob.clone())?;
    Ok(ItemPipeline::new(
        resolver,
        DedupChecker::new(catalog.clone()),
        images,
        GamePersister::new(catalog, blob).with_write_timeout(cfg.persist_timeout),
    ))
}
