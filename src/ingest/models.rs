use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::IngestError;

/// External provider a game name is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    Wiki,
    Steam,
    Catalog,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Wiki => "Wiki",
            SourceKind::Steam => "Steam",
            SourceKind::Catalog => "Catalog",
        }
    }

    /// Fields that must be present before a record from this source may be persisted.
    pub fn required_fields(self) -> &'static [GameField] {
        match self {
            SourceKind::Wiki => &[
                GameField::Title,
                GameField::Synopsis,
                GameField::Cover,
                GameField::Developer,
                GameField::Publisher,
                GameField::ReleaseYear,
                GameField::Genre,
            ],
            SourceKind::Steam => &[
                GameField::Title,
                GameField::Developer,
                GameField::Publisher,
                GameField::ReleaseYear,
                GameField::Genre,
            ],
            SourceKind::Catalog => &[GameField::Title],
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wiki" => Ok(SourceKind::Wiki),
            "steam" => Ok(SourceKind::Steam),
            "catalog" | "igdb" => Ok(SourceKind::Catalog),
            other => Err(format!("invalid source: {other}")),
        }
    }
}

/// One requested name in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionItem {
    pub name: String,
    pub source: SourceKind,
}

impl IngestionItem {
    pub fn new(name: impl Into<String>, source: SourceKind) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameField {
    Title,
    Synopsis,
    Cover,
    Developer,
    Publisher,
    ReleaseYear,
    Genre,
}

impl GameField {
    pub fn as_str(self) -> &'static str {
        match self {
            GameField::Title => "title",
            GameField::Synopsis => "synopsis",
            GameField::Cover => "image",
            GameField::Developer => "developer",
            GameField::Publisher => "publisher",
            GameField::ReleaseYear => "year",
            GameField::Genre => "genre",
        }
    }
}

/// Scraped fields, each optional until [`ParsedGameRecord::validate`] runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedGameRecord {
    pub title: Option<String>,
    pub synopsis: Option<String>,
    pub cover_image_url: Option<String>,
    pub developer: Option<String>,
    pub publisher: Option<String>,
    pub release_year: Option<i32>,
    pub genre: Option<String>,
    pub canonical_url: String,
}

impl ParsedGameRecord {
    pub fn new(canonical_url: impl Into<String>) -> Self {
        Self {
            canonical_url: canonical_url.into(),
            ..Default::default()
        }
    }

    fn has(&self, field: GameField) -> bool {
        fn filled(v: &Option<String>) -> bool {
            v.as_deref().is_some_and(|s| !s.trim().is_empty())
        }
        match field {
            GameField::Title => filled(&self.title),
            GameField::Synopsis => filled(&self.synopsis),
            GameField::Cover => filled(&self.cover_image_url),
            GameField::Developer => filled(&self.developer),
            GameField::Publisher => filled(&self.publisher),
            GameField::ReleaseYear => self.release_year.is_some(),
            GameField::Genre => filled(&self.genre),
        }
    }

    pub fn missing(&self, required: &[GameField]) -> Vec<&'static str> {
        required
            .iter()
            .filter(|f| !self.has(**f))
            .map(|f| f.as_str())
            .collect()
    }

    /// Checks completeness for `source` and produces a draft ready for persistence.
    pub fn validate(self, source: SourceKind) -> Result<GameDraft, IngestError> {
        let missing = self.missing(source.required_fields());
        if !missing.is_empty() {
            return Err(IngestError::ParseInsufficientData {
                url: self.canonical_url,
                missing,
            });
        }
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).unwrap_or_default();
        Ok(GameDraft {
            title: clean(self.title),
            synopsis: clean(self.synopsis),
            cover_image_url: clean(self.cover_image_url),
            developer: clean(self.developer),
            publisher: clean(self.publisher),
            release_year: self.release_year,
            genre: clean(self.genre),
            canonical_url: self.canonical_url,
        })
    }
}

/// Validated record, still carrying the remote cover URL.
#[derive(Debug, Clone, PartialEq)]
pub struct GameDraft {
    pub title: String,
    pub synopsis: String,
    pub cover_image_url: String,
    pub developer: String,
    pub publisher: String,
    pub release_year: Option<i32>,
    pub genre: String,
    pub canonical_url: String,
}

impl GameDraft {
    pub fn into_new_game(self, cover_image_filename: String, creator: i64) -> NewGame {
        NewGame {
            title: self.title,
            synopsis: self.synopsis,
            cover_image_filename,
            developer: self.developer,
            publisher: self.publisher,
            release_year: self.release_year,
            genre: self.genre,
            canonical_url: self.canonical_url,
            creator,
        }
    }
}

/// Insert payload for the catalog store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGame {
    pub title: String,
    pub synopsis: String,
    pub cover_image_filename: String,
    pub developer: String,
    pub publisher: String,
    pub release_year: Option<i32>,
    pub genre: String,
    pub canonical_url: String,
    pub creator: i64,
}

/// Persisted catalog row, serialized with the public API field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: i64,
    pub title: String,
    #[serde(rename = "preambula")]
    pub synopsis: String,
    #[serde(rename = "image")]
    pub cover_image_filename: String,
    pub developer: String,
    pub publisher: String,
    #[serde(rename = "year")]
    pub release_year: Option<i32>,
    pub genre: String,
    #[serde(rename = "url")]
    pub canonical_url: String,
    #[serde(rename = "creator")]
    pub creator_user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Planned,
    Playing,
    Finished,
    Dropped,
}

impl GameStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Planned => "planned",
            GameStatus::Playing => "playing",
            GameStatus::Finished => "finished",
            GameStatus::Dropped => "dropped",
        }
    }
}

pub const MAX_PRIORITY: i16 = 10;

/// Out-of-range priorities are normalized to 0 rather than rejected.
pub fn normalize_priority(raw: i64) -> i16 {
    if (0..=MAX_PRIORITY as i64).contains(&raw) {
        raw as i16
    } else {
        0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserGameLink {
    pub user_id: i64,
    pub game_id: i64,
    pub status: GameStatus,
    pub priority: i16,
}

impl UserGameLink {
    pub fn new(user_id: i64, game_id: i64, status: GameStatus, priority: i64) -> Self {
        Self {
            user_id,
            game_id,
            status,
            priority: normalize_priority(priority),
        }
    }

    /// Association created for the requester of an ingested game.
    pub fn planned(user_id: i64, game_id: i64) -> Self {
        Self::new(user_id, game_id, GameStatus::Planned, 0)
    }
}

#[derive(Debug)]
pub struct ItemFailure {
    pub name: String,
    pub error: IngestError,
}

impl ItemFailure {
    pub fn reason(&self) -> String {
        self.error.to_string()
    }
}

#[derive(Debug)]
pub enum ItemOutcome {
    Success(GameRecord),
    Failure(ItemFailure),
}

impl ItemOutcome {
    pub fn failure(name: impl Into<String>, error: IngestError) -> Self {
        ItemOutcome::Failure(ItemFailure {
            name: name.into(),
            error,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Created,
    PartialSuccess,
    InternalError,
}

#[derive(Debug, Default)]
pub struct BatchResult {
    pub successes: Vec<GameRecord>,
    pub failures: Vec<ItemFailure>,
}

impl BatchResult {
    pub fn push(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Success(game) => self.successes.push(game),
            ItemOutcome::Failure(f) => self.failures.push(f),
        }
    }

    pub fn len(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn outcome(&self) -> BatchOutcome {
        match (self.successes.is_empty(), self.failures.is_empty()) {
            (_, true) => BatchOutcome::Created,
            (true, false) => BatchOutcome::InternalError,
            (false, false) => BatchOutcome::PartialSuccess,
        }
    }
}
