//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs whose `sub` is the username. A valid token resolves
//! (or registers) the actor and attaches it to the request as an
//! `Extension<Actor>`. Anything else is sent to the login page.

use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use claims_core::ClaimStore;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::config::DEFAULT_LOGIN_URL;
use crate::error::AppError;

#[derive(Clone)]
pub struct JwtConfig {
    decoding_key: DecodingKey,
    validation: Validation,
    pub login_url: String,
}

impl JwtConfig {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            login_url: DEFAULT_LOGIN_URL.to_string(),
        }
    }

    pub fn with_login_url(mut self, login_url: impl Into<String>) -> Self {
        self.login_url = login_url.into();
        self
    }

    pub fn decode(&self, token: &str) -> Result<JwtClaims, jsonwebtoken::errors::Error> {
        decode::<JwtClaims>(token, &self.decoding_key, &self.validation).map(|data| data.claims)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: u64,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// 303 to the login page, carrying the original path in `next`.
pub fn login_redirect(login_url: &str, next: &str) -> Response {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    Redirect::to(&format!("{}?next={}", login_url, encoded)).into_response()
}

pub async fn jwt_auth(
    Extension(config): Extension<JwtConfig>,
    Extension(store): Extension<Arc<dyn ClaimStore>>,
    mut req: Request,
    next: Next,
) -> Response {
    let original = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let Some(token) = bearer_token(req.headers()) else {
        return login_redirect(&config.login_url, &original);
    };

    let claims = match config.decode(token) {
        Ok(claims) if !claims.sub.trim().is_empty() => claims,
        Ok(_) => {
            tracing::warn!("Rejected token with empty subject");
            return login_redirect(&config.login_url, &original);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Rejected bearer token");
            return login_redirect(&config.login_url, &original);
        }
    };

    match store.ensure_actor(claims.sub.trim()).await {
        Ok(actor) => {
            tracing::debug!(actor = %actor.username, "Authenticated request");
            req.extensions_mut().insert(actor);
            next.run(req).await
        }
        Err(e) => AppError::from(e).into_response(),
    }
}
