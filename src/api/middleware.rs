// Request logging, compression, CORS and JSON body handling.

use actix_cors::Cors;
use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::http::header;
use actix_web::middleware::{Compress, Logger};
use actix_web::{web, HttpRequest, HttpResponse};

use crate::api::models::ApiResponse;

/// Request bodies above this size are rejected before deserialization.
pub const JSON_BODY_LIMIT: usize = 256 * 1024;

pub fn setup_middleware() -> (Logger, Compress) {
    let logger = Logger::new("%a \"%r\" %s %b %Dms");
    let compress = Compress::default();
    (logger, compress)
}

pub fn setup_cors(allowed_origins: &str) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CONTENT_TYPE,
        ])
        .max_age(3600);

    for origin in allowed_origins.split(',').map(str::trim).filter(|o| !o.is_empty()) {
        cors = cors.allowed_origin(origin);
    }

    cors
}

/// Malformed or oversized JSON bodies become a 400 in the standard envelope.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_BODY_LIMIT)
        .error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
            tracing::debug!(error = %err, "bad request body");
            let response =
                HttpResponse::BadRequest().json(ApiResponse::<()>::error("bad request"));
            InternalError::from_response(err, response).into()
        })
}
