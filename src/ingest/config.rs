use std::time::Duration;

use crate::util::env::{env_opt, env_parse};

pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;
pub const DEFAULT_BATCH_DEADLINE: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_BATCH: usize = 100;

/// Limits applied by the orchestrator and the HTTP clients it drives.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub max_in_flight: usize,
    pub batch_deadline: Duration,
    pub max_batch: usize,
    pub source_timeout: Duration,
    pub image_timeout: Duration,
    /// Upper bound for each catalog write during persistence.
    pub persist_timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            batch_deadline: DEFAULT_BATCH_DEADLINE,
            max_batch: DEFAULT_MAX_BATCH,
            source_timeout: Duration::from_secs(3),
            image_timeout: Duration::from_secs(5),
            persist_timeout: Duration::from_secs(3),
        }
    }
}

impl IngestConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_in_flight: env_parse("INGEST_MAX_IN_FLIGHT", d.max_in_flight).max(1),
            batch_deadline: Duration::from_secs(
                env_parse("INGEST_BATCH_DEADLINE_SECS", d.batch_deadline.as_secs()).max(1),
            ),
            max_batch: env_parse("INGEST_MAX_BATCH", d.max_batch).max(1),
            source_timeout: Duration::from_secs(
                env_parse("SOURCE_HTTP_TIMEOUT_SECS", d.source_timeout.as_secs()).max(1),
            ),
            image_timeout: Duration::from_secs(
                env_parse("IMAGE_FETCH_TIMEOUT_SECS", d.image_timeout.as_secs()).max(1),
            ),
            persist_timeout: Duration::from_millis(
                env_parse("PERSIST_TIMEOUT_MS", d.persist_timeout.as_millis() as u64).max(1),
            ),
        }
    }
}

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Base URLs and credentials for the three metadata sources.
#[derive(Debug, Clone)]
pub struct SourceEndpoints {
    pub wiki_base_url: String,
    pub steam_store_url: String,
    pub igdb_api_url: String,
    pub twitch_token_url: String,
    pub twitch_client_id: Option<String>,
    pub twitch_client_secret: Option<String>,
    pub igdb_min_rating_count: u32,
    pub user_agent: String,
}

impl Default for SourceEndpoints {
    fn default() -> Self {
        Self {
            wiki_base_url: "https://ru.wikipedia.org".to_string(),
            steam_store_url: "https://store.steampowered.com".to_string(),
            igdb_api_url: "https://api.igdb.com/v4".to_string(),
            twitch_token_url: "https://id.twitch.tv/oauth2/token".to_string(),
            twitch_client_id: None,
            twitch_client_secret: None,
            igdb_min_rating_count: 5,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl SourceEndpoints {
    pub fn from_env() -> Self {
        let d = Self::default();
        let trim = |s: String| s.trim_end_matches('/').to_string();
        Self {
            wiki_base_url: env_opt("WIKI_BASE_URL").map(trim).unwrap_or(d.wiki_base_url),
            steam_store_url: env_opt("STEAM_STORE_URL")
                .map(trim)
                .unwrap_or(d.steam_store_url),
            igdb_api_url: env_opt("IGDB_API_URL").map(trim).unwrap_or(d.igdb_api_url),
            twitch_token_url: env_opt("TWITCH_TOKEN_URL").unwrap_or(d.twitch_token_url),
            twitch_client_id: env_opt("TWITCH_CLIENT_ID"),
            twitch_client_secret: env_opt("TWITCH_CLIENT_SECRET"),
            igdb_min_rating_count: env_parse("IGDB_MIN_RATING_COUNT", d.igdb_min_rating_count),
            user_agent: env_opt("SCRAPER_USER_AGENT").unwrap_or(d.user_agent),
        }
    }
}
