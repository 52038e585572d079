use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::error::IngestError;
use crate::database_ops::uploads::BlobStore;

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Extension chosen from the response content type; anything unrecognized is stored as jpg.
pub fn extension_for(content_type: &str) -> &'static str {
    let ct = content_type.to_ascii_lowercase();
    if ct.contains("png") {
        ".png"
    } else if ct.contains("gif") {
        ".gif"
    } else if ct.contains("webp") {
        ".webp"
    } else {
        ".jpg"
    }
}

/// First 8 bytes of sha256(url + timestamp), hex encoded, plus the extension.
pub fn image_filename(url: &str, content_type: &str, at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(at.timestamp_nanos_opt().unwrap_or_default().to_string().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    format!("{hex}{}", extension_for(content_type))
}

/// Downloads cover images into the blob store.
///
/// Runs with its own timeout and does not observe the batch deadline, so an
/// image already in flight is allowed to land.
#[derive(Clone)]
pub struct ImageFetcher {
    http: Client,
    blob: Arc<dyn BlobStore>,
    max_bytes: usize,
}

impl ImageFetcher {
    pub fn new(user_agent: &str, timeout: Duration, blob: Arc<dyn BlobStore>) -> anyhow::Result<Self> {
        let http = super::http::build_client(user_agent, timeout)?;
        Ok(Self::with_client(http, blob))
    }

    pub fn with_client(http: Client, blob: Arc<dyn BlobStore>) -> Self {
        Self {
            http,
            blob,
            max_bytes: MAX_IMAGE_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn blob(&self) -> &Arc<dyn BlobStore> {
        &self.blob
    }

    /// Returns the stored filename.
    pub async fn fetch(&self, url: &str) -> Result<String, IngestError> {
        if url.trim().is_empty() {
            return Err(IngestError::ImageDownloadFailed("image url is empty".into()));
        }
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| IngestError::ImageDownloadFailed(e.to_string()))?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(IngestError::ImageDownloadFailed(format!(
                "unexpected status {status}"
            )));
        }
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(IngestError::ImageDownloadFailed(format!(
                "unexpected content type: {content_type:?}"
            )));
        }
        let bytes = self.read_capped(resp).await?;

        let filename = image_filename(url, &content_type, Utc::now());
        self.blob
            .save(&bytes, &filename)
            .await
            .map_err(|e| IngestError::ImageDownloadFailed(e.to_string()))?;
        debug!(url, filename = %filename, size = bytes.len(), "stored cover image");
        Ok(filename)
    }

    /// Reads the body chunk by chunk, refusing anything larger than `max_bytes`.
    async fn read_capped(&self, mut resp: Response) -> Result<Vec<u8>, IngestError> {
        let too_large = |size: u64| {
            IngestError::ImageDownloadFailed(format!(
                "image is {size} bytes, limit is {}",
                self.max_bytes
            ))
        };
        if let Some(len) = resp.content_length() {
            if len > self.max_bytes as u64 {
                return Err(too_large(len));
            }
        }
        let mut body = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| IngestError::ImageDownloadFailed(e.to_string()))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(too_large((body.len() + chunk.len()) as u64));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}
