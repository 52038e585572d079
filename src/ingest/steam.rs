//! Storefront source. Store pages are requested in Russian with age-gate
//! cookies preset so the details block is rendered without interstitials.

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{ACCEPT_LANGUAGE, COOKIE};
use reqwest::{Client, RequestBuilder};
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::error::IngestError;
use super::http::{absolutize, collapse_whitespace, fetch_text};
use super::models::{ParsedGameRecord, SourceKind};
use super::resolver::{MetadataSource, ResolveOutcome};
use super::wiki::extract_year;

const STEAM_LANGUAGE: &str = "russian";
const STEAM_COUNTRY: &str = "RU";
const ACCEPT_LANGUAGE_VALUE: &str = "ru-RU,ru;q=0.8,en-US;q=0.6,en;q=0.4";
const STEAM_COOKIES: &str =
    "steamCountry=RU%7CMoscow; birthtime=473385601; wants_mature_content=1; Steam_Language=russian";

const TITLE_LABEL: &str = "Название";
const GENRE_LABEL: &str = "Жанр";
const DEVELOPER_LABEL: &str = "Разработчик";
const PUBLISHER_LABEL: &str = "Издатель";
const RELEASE_LABEL: &str = "Дата выхода";
/// Every label that may appear in the details block, in page order.
const DETAIL_LABELS: &[&str] = &[
    TITLE_LABEL,
    GENRE_LABEL,
    DEVELOPER_LABEL,
    PUBLISHER_LABEL,
    "Серия",
    "Франшиза",
    RELEASE_LABEL,
];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

static SUGGEST_MATCH: LazyLock<Selector> = LazyLock::new(|| selector("a.match"));
static DETAILS_BLOCK: LazyLock<Selector> =
    LazyLock::new(|| selector("div.details_block, #genresAndManufacturer"));
static APP_NAME: LazyLock<Selector> = LazyLock::new(|| selector("#appHubAppName"));
static DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| selector("div.game_description_snippet"));
static HEADER_IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("img.game_header_image_full"));

/// `Label: value` captures, each ending where the next known label (or the text) ends.
static DETAIL_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    let any_label = DETAIL_LABELS
        .iter()
        .map(|l| format!("{}:", regex::escape(l)))
        .collect::<Vec<_>>()
        .join("|");
    DETAIL_LABELS
        .iter()
        .map(|label| {
            let pattern = format!(r"{}:\s*(\S.*?)\s*(?:{}|$)", regex::escape(label), any_label);
            (
                *label,
                Regex::new(&pattern).expect("static regex must compile"),
            )
        })
        .collect()
});

fn detail(text: &str, label: &str) -> Option<String> {
    DETAIL_PATTERNS
        .iter()
        .find(|(l, _)| *l == label)
        .and_then(|(_, re)| re.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

pub struct SteamSource {
    http: Client,
    store_url: String,
}

impl SteamSource {
    pub fn new(http: Client, store_url: impl Into<String>) -> Self {
        Self {
            http,
            store_url: store_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn localized(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(ACCEPT_LANGUAGE, ACCEPT_LANGUAGE_VALUE)
            .header(COOKIE, STEAM_COOKIES)
    }

    async fn suggest(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, IngestError> {
        let req = self
            .http
            .get(format!("{}/search/suggest", self.store_url))
            .query(&[
                ("term", name),
                ("f", "games"),
                ("cc", STEAM_COUNTRY),
                ("l", STEAM_LANGUAGE),
                ("realm", "1"),
            ]);
        let body = fetch_text(self.localized(req), SourceKind::Steam, cancel).await?;
        Ok(first_suggestion(&body, &self.store_url))
    }
}

/// First suggested store link with its tracking query string removed, so the
/// same app always yields the same canonical URL.
pub fn first_suggestion(html: &str, store_url: &str) -> Option<String> {
    let doc = Html::parse_fragment(html);
    let href = doc
        .select(&SUGGEST_MATCH)
        .find_map(|a| a.value().attr("href"))?;
    let absolute = absolutize(href, store_url);
    match Url::parse(&absolute) {
        Ok(mut u) => {
            u.set_query(None);
            u.set_fragment(None);
            Some(u.to_string())
        }
        Err(_) => Some(absolute).filter(|s| !s.is_empty()),
    }
}

/// Store page URL with the interface language pinned.
pub fn localized_page_url(url: &str) -> Result<String, IngestError> {
    let mut u = Url::parse(url)
        .map_err(|e| IngestError::unavailable(SourceKind::Steam, format!("bad store url {url}: {e}")))?;
    let pairs: Vec<(String, String)> = u
        .query_pairs()
        .filter(|(k, _)| k != "l")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    u.query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair("l", STEAM_LANGUAGE);
    Ok(u.to_string())
}

pub fn parse_steam_html(html: &str, url: &str) -> ParsedGameRecord {
    let doc = Html::parse_document(html);
    let details = collapse_whitespace(
        &doc.select(&DETAILS_BLOCK)
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join(" "),
    );

    let mut record = ParsedGameRecord::new(url);
    record.title = detail(&details, TITLE_LABEL).or_else(|| {
        doc.select(&APP_NAME)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|s| !s.is_empty())
    });
    record.genre = detail(&details, GENRE_LABEL);
    record.developer = detail(&details, DEVELOPER_LABEL);
    record.publisher = detail(&details, PUBLISHER_LABEL);
    record.release_year = detail(&details, RELEASE_LABEL).and_then(|d| extract_year(&d));
    record.synopsis = doc
        .select(&DESCRIPTION)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|s| !s.is_empty());
    record.cover_image_url = doc
        .select(&HEADER_IMAGE)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(|src| absolutize(src, "https://store.steampowered.com"))
        .filter(|s| !s.is_empty());
    record
}

#[async_trait]
impl MetadataSource for SteamSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Steam
    }

    async fn resolve(&self, name: &str, cancel: &CancellationToken) -> ResolveOutcome {
        match self.suggest(name, cancel).await {
            Ok(Some(url)) => ResolveOutcome::Found(url),
            // An empty suggestion list is treated like any other failure so the
            // chain moves on to the next source.
            Ok(None) => ResolveOutcome::TransientError(format!("no store suggestions for \"{name}\"")),
            Err(e) => ResolveOutcome::TransientError(e.to_string()),
        }
    }

    async fn parse(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<ParsedGameRecord, IngestError> {
        let page = localized_page_url(url)?;
        let html = fetch_text(self.localized(self.http.get(&page)), SourceKind::Steam, cancel).await?;
        // The canonical URL stays the resolved one so dedup keys are stable.
        Ok(parse_steam_html(&html, url))
    }
}
