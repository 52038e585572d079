use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Row};
use thiserror::Error;
use tracing::instrument;

use super::db::Db;
use crate::ingest::models::{GameRecord, NewGame, UserGameLink};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    UniqueViolation,
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
    #[error("{0}")]
    Other(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::UniqueViolation,
            _ => StoreError::Database(err),
        }
    }
}

/// Catalog persistence used by the ingestion pipeline.
///
/// Implementations receive overlapping calls from concurrent batch items and
/// must be safe under that concurrency.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_by_url(&self, url: &str) -> Result<GameRecord, StoreError>;
    async fn insert(&self, game: &NewGame) -> Result<GameRecord, StoreError>;
    async fn insert_user_link(&self, link: &UserGameLink) -> Result<(), StoreError>;
    async fn delete(&self, id: i64) -> Result<(), StoreError>;
}

const GAME_COLUMNS: &str = "id, title, preambula, image, developer, publisher, year, genre, url, \
                            creator, created_at, updated_at";

fn game_from_row(row: &PgRow) -> Result<GameRecord, sqlx::Error> {
    Ok(GameRecord {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        synopsis: row.try_get("preambula")?,
        cover_image_filename: row.try_get("image")?,
        developer: row.try_get("developer")?,
        publisher: row.try_get("publisher")?,
        release_year: row.try_get("year")?,
        genre: row.try_get("genre")?,
        canonical_url: row.try_get("url")?,
        creator_user_id: row.try_get("creator")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

/// Postgres-backed catalog over the shared connection pool.
#[derive(Clone)]
pub struct PgCatalogStore {
    db: Db,
}

impl PgCatalogStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    #[instrument(skip(self))]
    async fn get_by_url(&self, url: &str) -> Result<GameRecord, StoreError> {
        let row = sqlx::query(&format!("SELECT {GAME_COLUMNS} FROM games WHERE url = $1"))
            .bind(url)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(game_from_row(&row)?)
    }

    #[instrument(skip(self, game), fields(url = %game.canonical_url))]
    async fn insert(&self, game: &NewGame) -> Result<GameRecord, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO games (title, preambula, image, developer, publisher, year, genre, url, creator)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {GAME_COLUMNS}"
        ))
        .bind(&game.title)
        .bind(&game.synopsis)
        .bind(&game.cover_image_filename)
        .bind(&game.developer)
        .bind(&game.publisher)
        .bind(game.release_year)
        .bind(&game.genre)
        .bind(&game.canonical_url)
        .bind(game.creator)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(game_from_row(&row)?)
    }

    #[instrument(skip(self))]
    async fn insert_user_link(&self, link: &UserGameLink) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO user_games (user_id, game_id, status, priority) VALUES ($1, $2, $3, $4)",
        )
        .bind(link.user_id)
        .bind(link.game_id)
        .bind(link.status.as_str())
        .bind(link.priority)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM games WHERE id = $1")
            .bind(id)
            .execute(&self.db.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
