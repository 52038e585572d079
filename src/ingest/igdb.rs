use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::SourceEndpoints;
use super::error::IngestError;
use super::http::{absolutize, cancellable};
use super::models::{ParsedGameRecord, SourceKind};
use super::resolver::{MetadataSource, ResolveOutcome};

const IGDB_IMAGE_BASE: &str = "https://images.igdb.com/igdb/image/upload";
const IGDB_COVER_SIZE: &str = "t_cover_big";
/// Main game, remake, remaster, expanded game. Bundles (3) and DLC are excluded.
const IGDB_GAME_TYPES: &str = "(0,8,9,10)";
const MAX_RETRIES: u32 = 2;
const BACKOFF_MS: u64 = 250;

#[derive(Debug, Clone, Deserialize)]
struct IgdbImage {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    image_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct IgdbNamed {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct IgdbInvolvedCompany {
    #[serde(default)]
    developer: bool,
    #[serde(default)]
    publisher: bool,
    #[serde(default)]
    company: Option<IgdbNamed>,
}

#[derive(Debug, Clone, Deserialize)]
struct IgdbGame {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    first_release_date: Option<i64>,
    #[serde(default)]
    cover: Option<IgdbImage>,
    #[serde(default)]
    genres: Option<Vec<IgdbNamed>>,
    #[serde(default)]
    involved_companies: Option<Vec<IgdbInvolvedCompany>>,
}

#[derive(Debug, Deserialize)]
struct TwitchTokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct IgdbToken {
    access_token: String,
    expires_at: Instant,
}

/// Structured catalog source (IGDB via Twitch client credentials).
pub struct IgdbSource {
    http: Client,
    endpoints: Arc<SourceEndpoints>,
    token: Arc<Mutex<Option<IgdbToken>>>,
}

impl IgdbSource {
    pub fn new(http: Client, endpoints: Arc<SourceEndpoints>) -> Self {
        Self {
            http,
            endpoints,
            token: Arc::new(Mutex::new(None)),
        }
    }

    fn credentials(&self) -> Result<(&str, &str), IngestError> {
        let id = self.endpoints.twitch_client_id.as_deref();
        let secret = self.endpoints.twitch_client_secret.as_deref();
        match (id, secret) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(IngestError::unavailable(
                SourceKind::Catalog,
                "missing TWITCH_CLIENT_ID / TWITCH_CLIENT_SECRET",
            )),
        }
    }

    async fn ensure_token(&self) -> Result<String, IngestError> {
        // Held across the request so concurrent items share one token fetch.
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if token.expires_at > Instant::now() + Duration::from_secs(30) {
                return Ok(token.access_token.clone());
            }
        }
        let token = self.request_new_token().await?;
        let access = token.access_token.clone();
        *guard = Some(token);
        Ok(access)
    }

    async fn request_new_token(&self) -> Result<IgdbToken, IngestError> {
        let (client_id, client_secret) = self.credentials()?;
        let response = self
            .http
            .post(&self.endpoints.twitch_token_url)
            .query(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| IngestError::unavailable(SourceKind::Catalog, e))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(IngestError::unavailable(
                SourceKind::Catalog,
                format!("token request failed (status={status}): {text}"),
            ));
        }
        let token: TwitchTokenResponse = response
            .json()
            .await
            .map_err(|e| IngestError::unavailable(SourceKind::Catalog, e))?;
        let ttl = token.expires_in.saturating_sub(30).max(30);
        debug!(ttl, "obtained catalog access token");
        Ok(IgdbToken {
            access_token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(ttl),
        })
    }

    async fn execute_request<T>(&self, body: String) -> Result<Vec<T>, IngestError>
    where
        T: DeserializeOwned,
    {
        let (client_id, _) = self.credentials()?;
        let endpoint = format!("{}/games", self.endpoints.igdb_api_url);
        let mut attempt = 0u32;
        loop {
            let token = self.ensure_token().await?;
            let response = self
                .http
                .post(&endpoint)
                .header("Client-ID", client_id)
                .header("Content-Type", "text/plain")
                .header("Authorization", format!("Bearer {token}"))
                .body(body.clone())
                .send()
                .await;

            let retryable = match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let text = resp
                            .text()
                            .await
                            .map_err(|e| IngestError::unavailable(SourceKind::Catalog, e))?;
                        return serde_json::from_str(&text).map_err(|err| {
                            IngestError::unavailable(
                                SourceKind::Catalog,
                                format!("failed to parse catalog payload ({err})"),
                            )
                        });
                    }
                    if status == StatusCode::UNAUTHORIZED {
                        *self.token.lock().await = None;
                    }
                    let text = resp.text().await.unwrap_or_default();
                    let reason = format!("catalog request failed (status={status}): {text}");
                    if status == StatusCode::TOO_MANY_REQUESTS
                        || status == StatusCode::UNAUTHORIZED
                        || status.is_server_error()
                    {
                        reason
                    } else {
                        return Err(IngestError::unavailable(SourceKind::Catalog, reason));
                    }
                }
                Err(err) => err.to_string(),
            };

            if attempt >= MAX_RETRIES {
                return Err(IngestError::unavailable(SourceKind::Catalog, retryable));
            }
            attempt += 1;
            warn!(attempt, error = %retryable, "retrying catalog request");
            tokio::time::sleep(Duration::from_millis(BACKOFF_MS * attempt as u64)).await;
        }
    }

    async fn search(&self, name: &str) -> Result<Option<String>, IngestError> {
        let games: Vec<IgdbGame> = self
            .execute_request(search_query(
                name,
                self.endpoints.igdb_min_rating_count,
                Utc::now().timestamp(),
            ))
            .await?;
        Ok(games.into_iter().find_map(|g| g.url))
    }

    async fn fetch_by_url(&self, url: &str) -> Result<ParsedGameRecord, IngestError> {
        let games: Vec<IgdbGame> = self.execute_request(detail_query(url)).await?;
        let game = games.into_iter().next().ok_or_else(|| IngestError::ParseInsufficientData {
            url: url.to_string(),
            missing: vec!["title"],
        })?;
        Ok(game_to_record(game, url))
    }
}

fn escape_apicalypse(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

fn search_query(name: &str, min_rating_count: u32, now: i64) -> String {
    format!(
        "search \"{}\"; fields name,url; where game_type = {} & first_release_date != null \
         & first_release_date < {} & total_rating_count >= {}; limit 1;",
        escape_apicalypse(name),
        IGDB_GAME_TYPES,
        now,
        min_rating_count
    )
}

fn detail_query(url: &str) -> String {
    format!(
        "fields name,summary,url,first_release_date,cover.url,cover.image_id,genres.name,\
         involved_companies.developer,involved_companies.publisher,involved_companies.company.name; \
         where url = \"{}\"; limit 1;",
        escape_apicalypse(url)
    )
}

/// Higher-resolution cover: built from `image_id` when present, otherwise the
/// thumbnail URL with its size segment swapped.
fn cover_url(image: &IgdbImage) -> Option<String> {
    if let Some(id) = image.image_id.as_deref().filter(|s| !s.is_empty()) {
        return Some(format!("{IGDB_IMAGE_BASE}/{IGDB_COVER_SIZE}/{id}.jpg"));
    }
    let raw = image.url.as_deref()?;
    let upsized = raw.replace("t_thumb", IGDB_COVER_SIZE);
    Some(absolutize(&upsized, "https://images.igdb.com")).filter(|s| !s.is_empty())
}

fn company_names(companies: &[IgdbInvolvedCompany], pick: fn(&IgdbInvolvedCompany) -> bool) -> Option<String> {
    let names: Vec<&str> = companies
        .iter()
        .filter(|c| pick(c))
        .filter_map(|c| c.company.as_ref()?.name.as_deref())
        .collect();
    (!names.is_empty()).then(|| names.join(", "))
}

fn game_to_record(game: IgdbGame, requested_url: &str) -> ParsedGameRecord {
    let companies = game.involved_companies.unwrap_or_default();
    let mut record = ParsedGameRecord::new(game.url.unwrap_or_else(|| requested_url.to_string()));
    record.title = game.name;
    record.synopsis = game.summary;
    record.cover_image_url = game.cover.as_ref().and_then(cover_url);
    record.developer = company_names(&companies, |c| c.developer);
    record.publisher = company_names(&companies, |c| c.publisher);
    record.release_year = game
        .first_release_date
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .map(|d| d.year());
    record.genre = game.genres.and_then(|genres| {
        let names: Vec<String> = genres.into_iter().filter_map(|g| g.name).collect();
        (!names.is_empty()).then(|| names.join(", "))
    });
    record
}

#[async_trait]
impl MetadataSource for IgdbSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Catalog
    }

    async fn resolve(&self, name: &str, cancel: &CancellationToken) -> ResolveOutcome {
        cancellable(cancel, self.search(name)).await.into()
    }

    async fn parse(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<ParsedGameRecord, IngestError> {
        cancellable(cancel, self.fetch_by_url(url)).await
    }

    fn for_batch(&self) -> Option<Arc<dyn MetadataSource>> {
        Some(Arc::new(IgdbSource::new(
            self.http.clone(),
            self.endpoints.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_typed_payload() {
        let payload = r#"[{
            "id": 72,
            "name": "Portal 2",
            "summary": "Sequel to Portal.",
            "url": "https://www.igdb.com/games/portal-2",
            "first_release_date": 1303171200,
            "cover": {"id": 1, "url": "//images.igdb.com/igdb/image/upload/t_thumb/co1rs4.jpg", "image_id": "co1rs4"},
            "genres": [{"id": 5, "name": "Shooter"}, {"id": 9, "name": "Puzzle"}],
            "involved_companies": [
                {"id": 1, "developer": true, "publisher": false, "company": {"id": 56, "name": "Valve"}},
                {"id": 2, "developer": false, "publisher": true, "company": {"id": 9, "name": "Electronic Arts"}},
                {"id": 3, "developer": false, "publisher": true, "company": {"id": 10, "name": "Valve"}}
            ]
        }]"#;
        let games: Vec<IgdbGame> = serde_json::from_str(payload).unwrap();
        let rec = game_to_record(games.into_iter().next().unwrap(), "ignored");
        assert_eq!(rec.title.as_deref(), Some("Portal 2"));
        assert_eq!(rec.developer.as_deref(), Some("Valve"));
        assert_eq!(rec.publisher.as_deref(), Some("Electronic Arts, Valve"));
        assert_eq!(rec.genre.as_deref(), Some("Shooter, Puzzle"));
        assert_eq!(rec.release_year, Some(2011));
        assert_eq!(
            rec.cover_image_url.as_deref(),
            Some("https://images.igdb.com/igdb/image/upload/t_cover_big/co1rs4.jpg")
        );
        assert_eq!(rec.canonical_url, "https://www.igdb.com/games/portal-2");
    }

    #[test]
    fn cover_falls_back_to_rewritten_thumbnail() {
        let img = IgdbImage {
            url: Some("//images.igdb.com/igdb/image/upload/t_thumb/abc.jpg".into()),
            image_id: None,
        };
        assert_eq!(
            cover_url(&img).as_deref(),
            Some("https://images.igdb.com/igdb/image/upload/t_cover_big/abc.jpg")
        );
        assert_eq!(cover_url(&IgdbImage { url: None, image_id: None }), None);
    }

    #[test]
    fn search_query_filters_and_escapes() {
        let q = search_query("The \"Orange\" Box", 5, 1_700_000_000);
        assert!(q.starts_with("search \"The \\\"Orange\\\" Box\";"));
        assert!(q.contains("game_type = (0,8,9,10)"));
        assert!(q.contains("first_release_date < 1700000000"));
        assert!(q.contains("total_rating_count >= 5"));
        assert!(q.ends_with("limit 1;"));
    }

    #[tokio::test]
    async fn missing_credentials_are_transient() {
        let http = Client::new();
        let source = IgdbSource::new(http, Arc::new(SourceEndpoints::default()));
        let outcome = source.resolve("Portal", &CancellationToken::new()).await;
        assert!(matches!(outcome, ResolveOutcome::TransientError(msg) if msg.contains("TWITCH_CLIENT_ID")));
    }
}
