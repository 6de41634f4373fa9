// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication middleware.

use crate::error::AppError;
use crate::services::identity::VerifyError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Cookie that may carry the session token instead of the header.
pub const TOKEN_COOKIE: &str = "fittrack_token";

/// Session token lifetime.
const SESSION_TTL_SECS: usize = 30 * 24 * 60 * 60;

/// Session JWT claims.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Pull the token from the cookie, falling back to `Authorization: Bearer`.
fn extract_token(jar: &CookieJar, request: &Request) -> Option<String> {
    if let Some(cookie) = jar.get(TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }

    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Middleware that requires a valid bearer token.
///
/// On success the verified claims are available to handlers as an
/// extension.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&jar, &request).ok_or(AppError::Unauthorized)?;

    let claims = state.token_verifier.verify(&token).await.map_err(|e| match e {
        VerifyError::Invalid(reason) => {
            tracing::debug!(reason = %reason, "Rejected bearer token");
            AppError::InvalidToken
        }
        VerifyError::Unavailable(reason) => AppError::Upstream(reason),
    })?;

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Create a JWT for a user session.
pub fn create_jwt(user_id: Uuid, email: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    let now = chrono::Utc::now().timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        iat: now,
        exp: now + SESSION_TTL_SECS,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}
