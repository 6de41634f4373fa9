// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod activities;
pub mod auth;
pub mod uploads;

use crate::error::{AppError, Result};
use crate::middleware::auth::require_auth;
use crate::AppState;
use axum::extract::{rejection::JsonRejection, State};
use axum::http::{header, Method};
use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub build_id: String,
}

/// Health check response
async fn health_check() -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "FitTrack API is running".to_string(),
        build_id,
    })
}

/// Settings the client needs before it renders its forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ClientConfig {
    pub uploads_enabled: bool,
    pub max_photo_bytes: usize,
    pub public_activity_feed: bool,
}

async fn client_config(State(state): State<Arc<AppState>>) -> Json<ClientConfig> {
    Json(ClientConfig {
        uploads_enabled: true,
        max_photo_bytes: state.photo_store.max_bytes(),
        public_activity_feed: state.config.public_activity_feed,
    })
}

/// Unwrap a JSON body, turning a malformed one into a 400 with our error shape.
pub(crate) fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

fn is_allowed_origin(origin: &str, frontend_url: &str, cloudfront_domain: Option<&str>) -> bool {
    let origin = origin.trim_end_matches('/');
    if origin == frontend_url.trim_end_matches('/') {
        return true;
    }
    if let Some(domain) = cloudfront_domain {
        let host = domain
            .trim_start_matches("https://")
            .trim_end_matches('/');
        if origin == format!("https://{host}") {
            return true;
        }
    }
    origin.starts_with("http://localhost") || origin.starts_with("http://127.0.0.1")
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS layer - allow requests from the frontend, its CDN and localhost (for dev)
    let frontend_url = state.config.frontend_url.clone();
    let cloudfront_domain = state.config.cloudfront_domain.clone();
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::predicate(
            move |origin: &axum::http::HeaderValue, _request_parts: &axum::http::request::Parts| {
                let origin_str = origin.to_str().unwrap_or("");
                is_allowed_origin(origin_str, &frontend_url, cloudfront_domain.as_deref())
            },
        ))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    let public_feed = state.config.public_activity_feed;
    let max_photo_bytes = state.photo_store.max_bytes();

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/api/health", get(health_check))
        .route("/api/config", get(client_config))
        .merge(auth::routes())
        .merge(activities::public_routes(public_feed))
        .merge(uploads::public_routes());

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .merge(activities::protected_routes(public_feed))
        .merge(uploads::protected_routes(max_photo_bytes))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
