use thiserror::Error;

use super::models::SourceKind;
use crate::database_ops::catalog::StoreError;

/// Why a single batch item failed. Rendered into the `errors` list of the batch response.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no {origin} page found for \"{name}\"")]
    ResolutionNotFound { name: String, origin: SourceKind },

    #[error("game already exists: {url}")]
    DuplicateRecord { url: String },

    #[error("insufficient data at {url}: missing {}", missing.join(", "))]
    ParseInsufficientData {
        url: String,
        missing: Vec<&'static str>,
    },

    #[error("image download failed: {0}")]
    ImageDownloadFailed(String),

    #[error("failed to create \"{title}\": {reason}")]
    PersistFailed { title: String, reason: String },

    #[error("timed out before the batch deadline")]
    Timeout,

    #[error("{origin} unavailable: {reason}")]
    SourceUnavailable { origin: SourceKind, reason: String },

    #[error("catalog lookup failed: {0}")]
    Storage(#[from] StoreError),

    #[error("item task aborted: {0}")]
    Aborted(String),
}

impl IngestError {
    pub fn unavailable(origin: SourceKind, reason: impl ToString) -> Self {
        IngestError::SourceUnavailable {
            origin,
            reason: reason.to_string(),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, IngestError::DuplicateRecord { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, IngestError::Timeout)
    }
}

/// Batch-level rejections; no item runs when one of these is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchRejection {
    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: no games names")]
    BatchEmpty,

    #[error("too many games: {len} > {max}")]
    BatchTooLarge { len: usize, max: usize },

    #[error("invalid source: {0}")]
    InvalidSource(String),
}
