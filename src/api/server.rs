// API server implementation using actix-web

use crate::api::handlers::AppState;
use crate::api::{auth, middleware, routes};
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};

use crate::util::env::{env_opt, env_parse, env_req};

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub allowed_origins: String,
    /// 0 keeps actix's default (one worker per core).
    pub workers: usize,
}

impl ApiServer {
    /// Create server from environment variables
    pub fn from_env() -> Result<Self> {
        crate::util::env::init_env();

        let host = env_opt("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = env_opt("API_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .context("Invalid API_PORT")?;

        let jwt_secret = env_req("JWT_SECRET").context("JWT_SECRET is required")?;

        let allowed_origins = env_opt("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string());

        let workers: usize = env_parse("API_WORKERS", 0);

        Ok(Self {
            host,
            port,
            jwt_secret,
            allowed_origins,
            workers,
        })
    }

    /// Start the HTTP server
    pub async fn run(self, state: AppState) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            "Starting gameshelf API server"
        );

        let state = web::Data::new(state);
        let jwt_secret = self.jwt_secret.clone();
        let allowed_origins = self.allowed_origins.clone();

        let mut server = HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);
            let auth = auth::Auth::new(jwt_secret.clone());

            App::new()
                .app_data(state.clone())
                .app_data(middleware::json_config())
                .wrap(auth)
                .wrap(cors)
                .wrap(compress)
                .wrap(logger)
                .configure(routes::configure_routes)
        });
        if self.workers > 0 {
            server = server.workers(self.workers);
        }

        server
            .bind(&bind_addr)
            .with_context(|| format!("Failed to bind to {}", bind_addr))?
            .run()
            .await
            .context("HTTP server error")?;

        Ok(())
    }
}
