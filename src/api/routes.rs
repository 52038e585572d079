// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check (no auth required)
        .route("/health", web::get().to(handlers::health_check))
        .service(
            web::scope("/api")
                .route("/health", web::get().to(handlers::health_check))
                .route("/games/multi", web::post().to(handlers::create_multi_games))
                .route(
                    "/games/multi/catalog",
                    web::post().to(handlers::create_multi_games_catalog),
                ),
        );
}
