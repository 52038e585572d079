// API request/response models (DTOs)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::error::BatchRejection;
use crate::ingest::models::{BatchResult, GameRecord, IngestionItem, SourceKind};

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: Some(Meta::now()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            meta: Some(Meta::now()),
        }
    }
}

/// Metadata included in all API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct Meta {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub version: String,
}

impl Meta {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: uuid::Uuid::new_v4().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub uptime_seconds: u64,
}

/// One entry of a bulk create request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestGame {
    #[serde(alias = "names")]
    pub name: String,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GamesRequest {
    #[serde(default)]
    pub games: Vec<RequestGame>,
}

impl GamesRequest {
    /// Items for the name-based endpoint; every entry must carry a known source.
    pub fn into_items(self) -> Result<Vec<IngestionItem>, BatchRejection> {
        self.games
            .into_iter()
            .map(|g| {
                let raw = g.source.unwrap_or_default();
                let source = raw
                    .parse::<SourceKind>()
                    .ok()
                    .filter(|s| matches!(s, SourceKind::Wiki | SourceKind::Steam))
                    .ok_or(BatchRejection::InvalidSource(raw))?;
                Ok(IngestionItem::new(g.name.trim(), source))
            })
            .collect()
    }

    /// Items for the catalog endpoint; the per-entry source is ignored.
    pub fn into_catalog_items(self) -> Vec<IngestionItem> {
        self.games
            .into_iter()
            .map(|g| IngestionItem::new(g.name.trim(), SourceKind::Catalog))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemError {
    pub name: String,
    pub error: String,
}

/// Body of the bulk create endpoints for 201, 207 and 500.
#[derive(Debug, Serialize, Deserialize)]
pub struct MultiGameResponse {
    pub success: Vec<GameRecord>,
    pub errors: Vec<ItemError>,
}

impl From<BatchResult> for MultiGameResponse {
    fn from(result: BatchResult) -> Self {
        Self {
            errors: result
                .failures
                .iter()
                .map(|f| ItemError {
                    name: f.name.clone(),
                    error: f.reason(),
                })
                .collect(),
            success: result.successes,
        }
    }
}
