use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, instrument, warn};

use super::error::IngestError;
use super::models::{GameRecord, NewGame, UserGameLink};
use crate::database_ops::catalog::{CatalogStore, StoreError};
use crate::database_ops::uploads::BlobStore;

pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(3);

/// Writes the catalog row and the requester's link, undoing both on failure.
#[derive(Clone)]
pub struct GamePersister {
    catalog: Arc<dyn CatalogStore>,
    blob: Arc<dyn BlobStore>,
    write_timeout: Duration,
}

impl GamePersister {
    pub fn new(catalog: Arc<dyn CatalogStore>, blob: Arc<dyn BlobStore>) -> Self {
        Self {
            catalog,
            blob,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Runs one catalog write; `None` means it did not finish in time.
    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Option<Result<T, StoreError>> {
        match tokio::time::timeout(self.write_timeout, fut).await {
            Ok(res) => Some(res),
            Err(_) => {
                let timeout_ms = self.write_timeout.as_millis() as u64;
                warn!(op, timeout_ms, "catalog write timed out");
                None
            }
        }
    }

    async fn discard_image(&self, filename: &str) {
        if filename.is_empty() {
            return;
        }
        if let Err(e) = self.blob.delete(filename).await {
            warn!(filename, error = %e, "failed to remove uploaded cover during rollback");
        }
    }

    async fn discard_game(&self, id: i64) {
        match self.bounded("delete", self.catalog.delete(id)).await {
            Some(Ok(())) => {}
            Some(Err(e)) => error!(id, error = %e, "failed to roll back game after link failure"),
            None => error!(id, "rollback of game timed out"),
        }
    }

    #[instrument(skip(self, game), fields(title = %game.title, url = %game.canonical_url))]
    pub async fn persist(&self, game: NewGame, user_id: i64) -> Result<GameRecord, IngestError> {
        let inserted = self.bounded("insert", self.catalog.insert(&game)).await;
        let record = match inserted {
            Some(Ok(record)) => record,
            Some(Err(err)) => {
                self.discard_image(&game.cover_image_filename).await;
                return Err(match err {
                    StoreError::UniqueViolation => IngestError::DuplicateRecord {
                        url: game.canonical_url,
                    },
                    other => IngestError::PersistFailed {
                        title: game.title,
                        reason: other.to_string(),
                    },
                });
            }
            None => {
                self.discard_image(&game.cover_image_filename).await;
                return Err(IngestError::Timeout);
            }
        };

        let link = UserGameLink::planned(user_id, record.id);
        let linked = self
            .bounded("insert_user_link", self.catalog.insert_user_link(&link))
            .await;
        let failure = match linked {
            Some(Ok(())) => return Ok(record),
            Some(Err(err)) => IngestError::PersistFailed {
                title: record.title.clone(),
                reason: format!("link to user {user_id}: {err}"),
            },
            None => IngestError::Timeout,
        };
        self.discard_image(&record.cover_image_filename).await;
        self.discard_game(record.id).await;
        Err(failure)
    }
}
