// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Password signup/login routes.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::Result;
use crate::middleware::auth::{create_jwt, TOKEN_COOKIE};
use crate::models::{PublicUser, User};
use crate::routes::json_body;
use crate::services::Credentials;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
}

/// Successful signup/login.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub token: String,
}

/// Session cookie mirroring the returned token, for browser clients.
fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    let secure = state.config.frontend_url.starts_with("https://");
    Cookie::build((TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(30))
        .build()
}

fn issue_session(state: &AppState, jar: CookieJar, user: &User) -> Result<(CookieJar, AuthResponse)> {
    let token = create_jwt(user.id, &user.email, &state.config.jwt_signing_key)?;
    let jar = jar.add(session_cookie(state, token.clone()));

    Ok((
        jar,
        AuthResponse {
            user: PublicUser::from(user),
            token,
        },
    ))
}

async fn signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: std::result::Result<Json<Credentials>, JsonRejection>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let user = state.user_service.signup(json_body(payload)?).await?;
    let (jar, body) = issue_session(&state, jar, &user)?;
    Ok((StatusCode::CREATED, jar, Json(body)))
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: std::result::Result<Json<Credentials>, JsonRejection>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let user = state.user_service.login(json_body(payload)?).await?;
    let (jar, body) = issue_session(&state, jar, &user)?;
    Ok((jar, Json(body)))
}

/// Clear the session cookie. Header-token clients just drop their token.
async fn logout(jar: CookieJar) -> (StatusCode, CookieJar) {
    let jar = jar.remove(Cookie::build(TOKEN_COOKIE).path("/"));
    (StatusCode::NO_CONTENT, jar)
}
