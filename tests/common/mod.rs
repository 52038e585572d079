//! In-memory collaborators shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use gameshelf::database_ops::catalog::{CatalogStore, StoreError};
use gameshelf::database_ops::uploads::{BlobStore, Uploads};
use gameshelf::ingest::config::IngestConfig;
use gameshelf::ingest::dedup::DedupChecker;
use gameshelf::ingest::error::IngestError;
use gameshelf::ingest::images::ImageFetcher;
use gameshelf::ingest::models::{GameRecord, NewGame, ParsedGameRecord, SourceKind, UserGameLink};
use gameshelf::ingest::persist::GamePersister;
use gameshelf::ingest::pipeline::ItemPipeline;
use gameshelf::ingest::resolver::{MetadataSource, ResolveOutcome, SourceResolver};
use gameshelf::orchestrator::IngestionOrchestrator;

#[derive(Default)]
pub struct MemoryCatalog {
    pub games: Mutex<Vec<GameRecord>>,
    pub links: Mutex<Vec<UserGameLink>>,
    pub get_calls: AtomicUsize,
    pub insert_calls: AtomicUsize,
    pub link_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub fail_links: AtomicBool,
    pub stall_inserts: AtomicBool,
    pub stall_links: AtomicBool,
    /// Makes the dedup lookup miss so only the unique constraint can catch a repeat.
    pub blind_lookups: AtomicBool,
}

async fn stall() {
    tokio::time::sleep(Duration::from_secs(3600)).await;
}

impl MemoryCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, url: &str) {
        let mut games = self.games.lock().unwrap();
        let id = games.len() as i64 + 1000;
        let now = Utc::now();
        games.push(GameRecord {
            id,
            title: "seeded".into(),
            synopsis: String::new(),
            cover_image_filename: String::new(),
            developer: String::new(),
            publisher: String::new(),
            release_year: None,
            genre: String::new(),
            canonical_url: url.to_string(),
            creator_user_id: 1,
            created_at: now,
            updated_at: now,
        });
    }

    pub fn total_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
            + self.insert_calls.load(Ordering::SeqCst)
            + self.link_calls.load(Ordering::SeqCst)
            + self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn get_by_url(&self, url: &str) -> Result<GameRecord, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.blind_lookups.load(Ordering::SeqCst) {
            return Err(StoreError::NotFound);
        }
        self.games
            .lock()
            .unwrap()
            .iter()
            .find(|g| g.canonical_url == url)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn insert(&self, game: &NewGame) -> Result<GameRecord, StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_inserts.load(Ordering::SeqCst) {
            stall().await;
        }
        let mut games = self.games.lock().unwrap();
        if games.iter().any(|g| g.canonical_url == game.canonical_url) {
            return Err(StoreError::UniqueViolation);
        }
        let now = Utc::now();
        let record = GameRecord {
            id: games.len() as i64 + 1,
            title: game.title.clone(),
            synopsis: game.synopsis.clone(),
            cover_image_filename: game.cover_image_filename.clone(),
            developer: game.developer.clone(),
            publisher: game.publisher.clone(),
            release_year: game.release_year,
            genre: game.genre.clone(),
            canonical_url: game.canonical_url.clone(),
            creator_user_id: game.creator,
            created_at: now,
            updated_at: now,
        };
        games.push(record.clone());
        Ok(record)
    }

    async fn insert_user_link(&self, link: &UserGameLink) -> Result<(), StoreError> {
        self.link_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_links.load(Ordering::SeqCst) {
            stall().await;
        }
        if self.fail_links.load(Ordering::SeqCst) {
            return Err(StoreError::Other("link table unavailable".into()));
        }
        self.links.lock().unwrap().push(link.clone());
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut games = self.games.lock().unwrap();
        let before = games.len();
        games.retain(|g| g.id != id);
        if games.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Source that resolves every name except those listed as unknown and returns
/// a complete record, tracking how many calls overlap.
pub struct FakeSource {
    pub kind: SourceKind,
    pub latency: Duration,
    pub unknown: HashSet<String>,
    pub cover_url: String,
    pub current: AtomicUsize,
    pub max_seen: AtomicUsize,
    pub resolve_calls: AtomicUsize,
    pub parse_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            latency: Duration::from_millis(0),
            unknown: HashSet::new(),
            cover_url: String::new(),
            current: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
            resolve_calls: AtomicUsize::new(0),
            parse_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_unknown(mut self, names: &[&str]) -> Self {
        self.unknown = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_cover(mut self, url: impl Into<String>) -> Self {
        self.cover_url = url.into();
        self
    }

    pub fn url_for(name: &str) -> String {
        format!("https://fake.example/{}", name.replace(' ', "_"))
    }
}

#[async_trait]
impl MetadataSource for FakeSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn resolve(&self, name: &str, cancel: &CancellationToken) -> ResolveOutcome {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        let cancelled = tokio::select! {
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(self.latency) => false,
        };
        self.current.fetch_sub(1, Ordering::SeqCst);
        if cancelled {
            return ResolveOutcome::TransientError("cancelled".into());
        }
        if self.unknown.contains(name) {
            ResolveOutcome::NotFound
        } else {
            ResolveOutcome::Found(Self::url_for(name))
        }
    }

    async fn parse(
        &self,
        url: &str,
        _cancel: &CancellationToken,
    ) -> Result<ParsedGameRecord, IngestError> {
        self.parse_calls.fetch_add(1, Ordering::SeqCst);
        let title = url.rsplit('/').next().unwrap_or_default().replace('_', " ");
        let mut rec = ParsedGameRecord::new(url);
        rec.title = Some(title);
        rec.synopsis = Some("A game.".into());
        rec.cover_image_url = Some(self.cover_url.clone()).filter(|s| !s.is_empty());
        rec.developer = Some("Valve".into());
        rec.publisher = Some("Valve".into());
        rec.release_year = Some(2004);
        rec.genre = Some("Shooter".into());
        Ok(rec)
    }
}

pub struct Harness {
    pub catalog: Arc<MemoryCatalog>,
    pub uploads: Arc<Uploads>,
    pub source: Arc<FakeSource>,
    pub orchestrator: IngestionOrchestrator,
    pub _dir: tempfile::TempDir,
}

pub async fn harness(source: FakeSource, cfg: IngestConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let uploads = Arc::new(Uploads::open(dir.path()).await.unwrap());
    let catalog = MemoryCatalog::new();
    let source = Arc::new(source);
    let blob: Arc<dyn BlobStore> = uploads.clone();

    let resolver = SourceResolver::new().with_source(source.clone());
    let pipeline = ItemPipeline::new(
        resolver,
        DedupChecker::new(catalog.clone()),
        ImageFetcher::with_client(reqwest::Client::new(), blob.clone()),
        GamePersister::new(catalog.clone(), blob).with_write_timeout(cfg.persist_timeout),
    );
    Harness {
        catalog,
        uploads,
        source,
        orchestrator: IngestionOrchestrator::new(pipeline, cfg),
        _dir: dir,
    }
}

pub fn files_in(dir: &std::path::Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect()
}
