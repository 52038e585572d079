//! Encyclopedia source: opensearch for resolution, infobox scraping for fields.
//!
//! Labels are matched against the Russian-language edition, which is the
//! default `WIKI_BASE_URL`.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::sync::LazyLock;
use tokio_util::sync::CancellationToken;

use super::error::IngestError;
use super::http::{absolutize, collapse_whitespace, fetch_text};
use super::models::{ParsedGameRecord, SourceKind};
use super::resolver::{MetadataSource, ResolveOutcome};

const DEVELOPER_LABELS: (&str, &str) = ("Разработчик", "Разработчики");
const PUBLISHER_LABELS: (&str, &str) = ("Издатель", "Издатели");
const GENRE_LABELS: (&str, &str) = ("Жанр", "Жанры");
const RELEASE_LABELS: (&str, &str) = ("Дата выпуска", "Даты выпуска");

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

static INFOBOX: LazyLock<Selector> = LazyLock::new(|| selector("table.infobox"));
static INFOBOX_ABOVE: LazyLock<Selector> = LazyLock::new(|| selector("th.infobox-above"));
static INFOBOX_IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("td.infobox-image img"));
static LABEL_CELL: LazyLock<Selector> = LazyLock::new(|| selector("th"));
static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("static regex must compile"));

pub struct WikiSource {
    http: Client,
    base_url: String,
}

impl WikiSource {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn opensearch_url(&self, name: &str) -> String {
        format!(
            "{}/w/api.php?action=opensearch&format=json&formatversion=2&search={}&namespace=0&limit=10",
            self.base_url,
            urlencoding::encode(name)
        )
    }

    async fn find_page(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, IngestError> {
        let body = fetch_text(self.http.get(self.opensearch_url(name)), SourceKind::Wiki, cancel)
            .await?;
        first_opensearch_link(&body)
    }
}

/// Opensearch answers `[query, [titles], [descriptions], [links]]`.
pub fn first_opensearch_link(body: &str) -> Result<Option<String>, IngestError> {
    let data: Value = serde_json::from_str(body)
        .map_err(|e| IngestError::unavailable(SourceKind::Wiki, format!("bad opensearch payload: {e}")))?;
    let link = data
        .get(3)
        .and_then(Value::as_array)
        .and_then(|links| links.first())
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string);
    Ok(link)
}

fn cell_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

/// Finds the label cell whose text equals the singular or plural label and
/// returns the adjacent cell's text, flagging whether the plural form matched.
fn labelled_value(infobox: ElementRef<'_>, (singular, plural): (&str, &str)) -> Option<(String, bool)> {
    for th in infobox.select(&LABEL_CELL) {
        let label = cell_text(th);
        let is_plural = if label == plural {
            true
        } else if label == singular {
            false
        } else {
            continue;
        };
        let value = th
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .next()
            .map(cell_text)
            .unwrap_or_default();
        return Some((value, is_plural));
    }
    None
}

/// Party fields (developer/publisher): a plural label lists several parties,
/// only the first token is kept.
fn party(infobox: ElementRef<'_>, labels: (&str, &str)) -> Option<String> {
    let (value, plural) = labelled_value(infobox, labels)?;
    let value = if plural {
        value.split_whitespace().next().unwrap_or_default().to_string()
    } else {
        value
    };
    Some(value).filter(|v| !v.is_empty())
}

pub fn extract_year(text: &str) -> Option<i32> {
    YEAR.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Extracts the record from an article page. Missing fields are left `None`;
/// completeness is checked by the caller.
pub fn parse_wiki_html(html: &str, url: &str, base_url: &str) -> ParsedGameRecord {
    let doc = Html::parse_document(html);
    let mut record = ParsedGameRecord::new(url);
    let Some(infobox) = doc.select(&INFOBOX).next() else {
        return record;
    };

    record.title = infobox
        .select(&INFOBOX_ABOVE)
        .next()
        .map(cell_text)
        .filter(|t| !t.is_empty());
    record.developer = party(infobox, DEVELOPER_LABELS);
    record.publisher = party(infobox, PUBLISHER_LABELS);
    record.genre = labelled_value(infobox, GENRE_LABELS)
        .map(|(v, _)| v)
        .filter(|v| !v.is_empty());
    record.release_year = labelled_value(infobox, RELEASE_LABELS).and_then(|(v, _)| extract_year(&v));
    record.cover_image_url = infobox
        .select(&INFOBOX_IMAGE)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(|src| absolutize(src, base_url))
        .filter(|s| !s.is_empty());
    record.synopsis = infobox
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "p")
        .map(cell_text)
        .find(|t| !t.is_empty());
    record
}

#[async_trait]
impl MetadataSource for WikiSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Wiki
    }

    async fn resolve(&self, name: &str, cancel: &CancellationToken) -> ResolveOutcome {
        self.find_page(name, cancel).await.into()
    }

    async fn parse(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<ParsedGameRecord, IngestError> {
        let html = fetch_text(self.http.get(url), SourceKind::Wiki, cancel).await?;
        Ok(parse_wiki_html(&html, url, &self.base_url))
    }
}
