// Authentication middleware for API endpoints

use actix_web::{
    body::{BoxBody, EitherBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, HttpResponse,
};
use futures::future::LocalBoxFuture;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use std::rc::Rc;

use crate::api::models::ApiResponse;

/// Token payload; `uid` is the catalog user id and must be positive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub uid: i64,
    pub exp: usize,
}

/// Authenticated caller, stored as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
}

pub fn verify_token(token: &str, secret: &str) -> Result<AuthUser, jsonwebtoken::errors::Error> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    if data.claims.uid <= 0 {
        return Err(ErrorKind::InvalidSubject.into());
    }
    Ok(AuthUser {
        user_id: data.claims.uid,
    })
}

/// Signs a token for `user_id`, valid for `ttl_secs`. Used by the CLI and tests.
pub fn issue_token(
    user_id: i64,
    secret: &str,
    ttl_secs: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let exp = (chrono::Utc::now().timestamp() + ttl_secs).max(0) as usize;
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &Claims { uid: user_id, exp },
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

fn is_public(path: &str) -> bool {
    matches!(path, "/health" | "/api/health")
}

/// Bearer JWT middleware.
///
/// A valid token attaches [`AuthUser`]; an invalid one is answered with 401.
/// Requests without a token pass through unauthenticated and are rejected by
/// the handlers that need an identity.
pub struct Auth {
    secret: Rc<String>,
}

impl Auth {
    pub fn new(secret: String) -> Self {
        Self {
            secret: Rc::new(secret),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Auth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B, BoxBody>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddleware {
            service,
            secret: self.secret.clone(),
        }))
    }
}

pub struct AuthMiddleware<S> {
    service: S,
    secret: Rc<String>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B, BoxBody>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if !is_public(req.path()) {
            let bearer = req
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(str::trim);

            if let Some(token) = bearer {
                match verify_token(token, &self.secret) {
                    Ok(user) => {
                        req.extensions_mut().insert(user);
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, path = req.path(), "rejected bearer token");
                        return Box::pin(async move {
                            let response = HttpResponse::Unauthorized()
                                .json(ApiResponse::<()>::error("unauthorized"))
                                .map_into_right_body();
                            Ok(req.into_response(response))
                        });
                    }
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_left_body())
        })
    }
}
