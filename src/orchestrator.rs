//! Batch fan-out: one task per name, a shared permit pool and a single
//! batch deadline. Every submitted name comes back as exactly one success
//! or one failure.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::ingest::config::IngestConfig;
use crate::ingest::error::{BatchRejection, IngestError};
use crate::ingest::models::{BatchResult, IngestionItem, ItemOutcome};
use crate::ingest::pipeline::ItemPipeline;

#[derive(Clone)]
pub struct IngestionOrchestrator {
    pipeline: ItemPipeline,
    cfg: IngestConfig,
}

impl IngestionOrchestrator {
    pub fn new(pipeline: ItemPipeline, cfg: IngestConfig) -> Self {
        Self { pipeline, cfg }
    }

    /// Checks applied before any item starts.
    pub fn validate_batch(
        &self,
        items: &[IngestionItem],
        requester: Option<i64>,
    ) -> Result<i64, BatchRejection> {
        let user_id = requester
            .filter(|id| *id > 0)
            .ok_or(BatchRejection::Unauthorized)?;
        if items.is_empty() {
            return Err(BatchRejection::BatchEmpty);
        }
        if items.len() > self.cfg.max_batch {
            return Err(BatchRejection::BatchTooLarge {
                len: items.len(),
                max: self.cfg.max_batch,
            });
        }
        Ok(user_id)
    }

    pub async fn run(
        &self,
        items: Vec<IngestionItem>,
        requester: Option<i64>,
    ) -> Result<BatchResult, BatchRejection> {
        let user_id = self.validate_batch(&items, requester)?;
        let started = Instant::now();
        let total = items.len();

        let pipeline = Arc::new(self.pipeline.for_batch());
        let permits = Arc::new(Semaphore::new(self.cfg.max_in_flight.max(1)));
        let cancel = CancellationToken::new();
        // Fires the token on every exit path so the watchdog never outlives the batch.
        let _cancel_on_exit = cancel.clone().drop_guard();

        let deadline = self.cfg.batch_deadline;
        let watchdog = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(deadline) => {
                    warn!(deadline_secs = deadline.as_secs(), "batch deadline reached, cancelling remaining items");
                    watchdog.cancel();
                }
                _ = watchdog.cancelled() => {}
            }
        });

        let mut tasks = FuturesUnordered::new();
        for item in items {
            let name = item.name.clone();
            let pipeline = pipeline.clone();
            let permits = permits.clone();
            let cancel = cancel.clone();
            let handle = tokio::spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return ItemOutcome::failure(item.name, IngestError::Timeout);
                    }
                    permit = permits.acquire_owned() => match permit {
                        Ok(p) => p,
                        Err(_) => return ItemOutcome::failure(item.name, IngestError::Timeout),
                    },
                };
                pipeline.run(&item, user_id, &cancel).await
            });
            tasks.push(async move { (name, handle.await) });
        }

        let mut result = BatchResult::default();
        while let Some((name, joined)) = tasks.next().await {
            match joined {
                Ok(outcome) => result.push(outcome),
                Err(e) => {
                    warn!(game = %name, error = %e, "item task did not complete");
                    result.push(ItemOutcome::failure(name, IngestError::Aborted(e.to_string())));
                }
            }
        }

        let timeouts = result.failures.iter().filter(|f| f.error.is_timeout()).count();
        info!(
            total,
            success_count = result.successes.len(),
            error_count = result.failures.len(),
            timeouts,
            elapsed_ms = started.elapsed().as_millis() as u64,
            outcome = ?result.outcome(),
            "batch finished"
        );
        Ok(result)
    }
}
