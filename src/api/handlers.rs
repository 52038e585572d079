// HTTP request handlers for API endpoints

use crate::api::auth::AuthUser;
use crate::api::models::*;
use crate::database_ops::db::Db;
use crate::ingest::error::BatchRejection;
use crate::ingest::models::{BatchOutcome, IngestionItem};
use crate::orchestrator::IngestionOrchestrator;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Result};
use std::time::Instant;

/// Shared per-worker state.
pub struct AppState {
    pub orchestrator: IngestionOrchestrator,
    pub db: Option<Db>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(orchestrator: IngestionOrchestrator, db: Option<Db>) -> Self {
        Self {
            orchestrator,
            db,
            started_at: Instant::now(),
        }
    }
}

/// Health check endpoint
pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse> {
    let db_status = match &state.db {
        Some(db) if db.ping().await => "connected",
        Some(_) => "disconnected",
        None => "not configured",
    };

    let response = ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        database: db_status.to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    });

    Ok(HttpResponse::Ok().json(response))
}

fn rejection_response(rejection: &BatchRejection) -> HttpResponse {
    let status = match rejection {
        BatchRejection::Unauthorized => StatusCode::UNAUTHORIZED,
        BatchRejection::BatchEmpty
        | BatchRejection::BatchTooLarge { .. }
        | BatchRejection::InvalidSource(_) => StatusCode::BAD_REQUEST,
    };
    HttpResponse::build(status).json(ApiResponse::<()>::error(rejection.to_string()))
}

async fn run_batch(
    state: &AppState,
    items: Vec<IngestionItem>,
    user: Option<AuthUser>,
) -> HttpResponse {
    let requester = user.map(|u| u.user_id);
    let result = match state.orchestrator.run(items, requester).await {
        Ok(result) => result,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "batch rejected");
            return rejection_response(&rejection);
        }
    };

    let status = match result.outcome() {
        BatchOutcome::Created => StatusCode::CREATED,
        BatchOutcome::PartialSuccess => StatusCode::MULTI_STATUS,
        BatchOutcome::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    };
    HttpResponse::build(status).json(MultiGameResponse::from(result))
}

/// Bulk create from names resolved against Wiki or Steam.
pub async fn create_multi_games(
    state: web::Data<AppState>,
    user: Option<web::ReqData<AuthUser>>,
    payload: web::Json<GamesRequest>,
) -> Result<HttpResponse> {
    let user = user.map(|u| u.into_inner());
    let items = match payload.into_inner().into_items() {
        Ok(items) => items,
        // Missing identity wins over payload validation.
        Err(rejection) if user.is_some() => return Ok(rejection_response(&rejection)),
        Err(_) => return Ok(rejection_response(&BatchRejection::Unauthorized)),
    };
    tracing::info!(count = items.len(), user_id = ?user.as_ref().map(|u| u.user_id), "bulk create requested");
    Ok(run_batch(&state, items, user).await)
}

/// Bulk create from the structured catalog.
pub async fn create_multi_games_catalog(
    state: web::Data<AppState>,
    user: Option<web::ReqData<AuthUser>>,
    payload: web::Json<GamesRequest>,
) -> Result<HttpResponse> {
    let user = user.map(|u| u.into_inner());
    let items = payload.into_inner().into_catalog_items();
    tracing::info!(count = items.len(), user_id = ?user.as_ref().map(|u| u.user_id), "catalog bulk create requested");
    Ok(run_batch(&state, items, user).await)
}
