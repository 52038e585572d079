use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dedup::DedupChecker;
use super::error::IngestError;
use super::http::cancellable;
use super::images::ImageFetcher;
use super::models::{GameRecord, IngestionItem, ItemOutcome};
use super::persist::GamePersister;
use super::resolver::SourceResolver;

/// Runs one name through resolve, dedup, parse, image fetch and persist.
#[derive(Clone)]
pub struct ItemPipeline {
    resolver: SourceResolver,
    dedup: DedupChecker,
    images: ImageFetcher,
    persister: GamePersister,
}

impl ItemPipeline {
    pub fn new(
        resolver: SourceResolver,
        dedup: DedupChecker,
        images: ImageFetcher,
        persister: GamePersister,
    ) -> Self {
        Self {
            resolver,
            dedup,
            images,
            persister,
        }
    }

    /// Same collaborators with per-batch source state reset.
    pub fn for_batch(&self) -> Self {
        Self {
            resolver: self.resolver.for_batch(),
            ..self.clone()
        }
    }

    pub async fn run(
        &self,
        item: &IngestionItem,
        user_id: i64,
        cancel: &CancellationToken,
    ) -> ItemOutcome {
        match self.process(item, user_id, cancel).await {
            Ok(record) => {
                info!(game = %item.name, id = record.id, url = %record.canonical_url, "game created");
                ItemOutcome::Success(record)
            }
            Err(err) => {
                if err.is_duplicate() {
                    info!(game = %item.name, error = %err, "skipping duplicate");
                } else {
                    warn!(game = %item.name, source = %item.source, error = %err, "item failed");
                }
                ItemOutcome::failure(item.name.clone(), err)
            }
        }
    }

    async fn process(
        &self,
        item: &IngestionItem,
        user_id: i64,
        cancel: &CancellationToken,
    ) -> Result<GameRecord, IngestError> {
        if cancel.is_cancelled() {
            return Err(IngestError::Timeout);
        }
        let resolved = self.resolver.resolve(&item.name, item.source, cancel).await?;

        let exists = cancellable(cancel, async {
            self.dedup.exists(&resolved.url).await.map_err(IngestError::from)
        })
        .await?;
        if exists {
            return Err(IngestError::DuplicateRecord { url: resolved.url });
        }

        let draft = self
            .resolver
            .parse(&resolved, cancel)
            .await?
            .validate(resolved.source)?;

        let cover = if draft.cover_image_url.is_empty() {
            String::new()
        } else {
            match self.images.fetch(&draft.cover_image_url).await {
                Ok(filename) => filename,
                Err(e) => {
                    warn!(game = %item.name, url = %draft.cover_image_url, error = %e, "cover download failed, continuing without image");
                    String::new()
                }
            }
        };

        // Deadline passed while the cover was downloading: drop it instead of writing.
        if cancel.is_cancelled() {
            if !cover.is_empty() {
                if let Err(e) = self.images.blob().delete(&cover).await {
                    debug!(filename = %cover, error = %e, "could not remove orphaned cover");
                }
            }
            return Err(IngestError::Timeout);
        }

        self.persister
            .persist(draft.into_new_game(cover, user_id), user_id)
            .await
    }
}
