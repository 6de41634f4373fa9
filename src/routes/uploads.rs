// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Photo upload and download.

use crate::error::{AppError, Result};
use crate::services::{StoredPhoto, VerifiedClaims};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;

/// `POST /api/uploads`, behind the auth middleware.
pub fn protected_routes(max_photo_bytes: usize) -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/uploads",
        post(upload_photo).layer(DefaultBodyLimit::max(max_photo_bytes)),
    )
}

/// `GET /photos/{*key}`, public so stored URLs can be embedded directly.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/photos/{*key}", get(get_photo))
}

/// Store the raw request body as a photo owned by the caller.
async fn upload_photo(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<VerifiedClaims>,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<StoredPhoto>)> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::UnsupportedMediaType("Content-Type is required".to_string()))?
        .to_string();

    let body = body.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(format!(
                "photo exceeds {} bytes",
                state.photo_store.max_bytes()
            ))
        } else {
            AppError::BadRequest(e.body_text())
        }
    })?;

    let caller = state.user_service.resolve_caller(&claims).await?;
    let stored = state
        .photo_store
        .put(caller.id, &content_type, body.to_vec())
        .await?;

    Ok((StatusCode::CREATED, Json(stored)))
}

async fn get_photo(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse> {
    let photo = state
        .photo_store
        .get(&key)
        .await?
        .ok_or_else(|| AppError::NotFound("Photo not found".to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, photo.content_type),
            // Keys are never reused.
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        photo.bytes,
    ))
}
