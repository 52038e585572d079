use anyhow::Context;
use reqwest::{Client, RequestBuilder, StatusCode};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::error::IngestError;
use super::models::SourceKind;

/// Shared client for source lookups; every request is additionally bounded by
/// the batch cancellation token.
pub fn build_client(user_agent: &str, timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .context("failed to construct source HTTP client")
}

/// Races `fut` against the batch deadline.
pub async fn cancellable<F, T>(cancel: &CancellationToken, fut: F) -> Result<T, IngestError>
where
    F: Future<Output = Result<T, IngestError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(IngestError::Timeout),
        res = fut => res,
    }
}

/// Sends `req` and returns the body of a 200 response.
pub async fn fetch_text(
    req: RequestBuilder,
    origin: SourceKind,
    cancel: &CancellationToken,
) -> Result<String, IngestError> {
    cancellable(cancel, async {
        let resp = req
            .send()
            .await
            .map_err(|e| IngestError::unavailable(origin, e))?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(IngestError::unavailable(
                origin,
                format!("unexpected status {status} from {}", resp.url()),
            ));
        }
        resp.text()
            .await
            .map_err(|e| IngestError::unavailable(origin, e))
    })
    .await
}

/// Collapses runs of whitespace (including non-breaking spaces) into single spaces.
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Turns protocol-relative and root-relative links into absolute https URLs.
pub fn absolutize(raw: &str, base: &str) -> String {
    let s = raw.trim();
    if s.is_empty() {
        return String::new();
    }
    if s.starts_with("//") {
        return format!("https:{s}");
    }
    if s.starts_with('/') {
        return format!("{}{}", base.trim_end_matches('/'), s);
    }
    s.to_string()
}
