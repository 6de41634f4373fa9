// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity routes.

use crate::error::{AppError, Result};
use crate::models::Activity;
use crate::routes::json_body;
use crate::services::{CreateActivityRequest, UpdateActivityRequest, VerifiedClaims};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

/// Routes that anyone may call.
///
/// `GET /api/activities` lands here only when the feed is public.
pub fn public_routes(public_feed: bool) -> Router<Arc<AppState>> {
    let router = Router::new()
        .route("/api/activities/user/{user_id}", get(list_user_activities))
        .route("/api/activities/{id}", get(get_activity));

    if public_feed {
        router.route("/api/activities", get(list_all_activities))
    } else {
        router
    }
}

/// Routes that need a verified caller.
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn protected_routes(public_feed: bool) -> Router<Arc<AppState>> {
    let list_route = if public_feed {
        post(create_activity)
    } else {
        post(create_activity).get(list_all_activities)
    };

    Router::new()
        .route("/api/activities", list_route)
        .route("/api/activities/me", get(list_my_activities))
        .route(
            "/api/activities/{id}",
            put(update_activity).delete(delete_activity),
        )
}

/// Response for a successful delete.
#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteResponse {
    pub success: bool,
    pub id: Uuid,
}

/// Ids in read paths that are not UUIDs simply do not exist.
fn read_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Activity not found".to_string()))
}

/// Mutations get the same answer for a bad id as for someone else's record.
fn mutation_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::Forbidden)
}

async fn create_activity(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<VerifiedClaims>,
    payload: std::result::Result<Json<CreateActivityRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Activity>)> {
    let request = json_body(payload)?;
    let caller = state.user_service.resolve_caller(&claims).await?;

    let activity = state
        .activity_service
        .create_activity(request, caller.id)
        .await?;

    Ok((StatusCode::CREATED, Json(activity)))
}

async fn list_all_activities(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Activity>>> {
    Ok(Json(state.activity_service.get_all_activities().await?))
}

/// The caller's own activities. First contact from a new identity-provider
/// user provisions their account here.
async fn list_my_activities(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<VerifiedClaims>,
) -> Result<Json<Vec<Activity>>> {
    let caller = state.user_service.resolve_caller(&claims).await?;
    Ok(Json(
        state.activity_service.get_activities_by_user(caller.id).await?,
    ))
}

async fn list_user_activities(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Activity>>> {
    // An unknown or malformed user id just has no activities.
    let Ok(user_id) = Uuid::parse_str(&user_id) else {
        return Ok(Json(Vec::new()));
    };
    Ok(Json(
        state.activity_service.get_activities_by_user(user_id).await?,
    ))
}

async fn get_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Activity>> {
    let id = read_id(&id)?;
    state
        .activity_service
        .get_activity_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Activity not found".to_string()))
}

async fn update_activity(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<VerifiedClaims>,
    Path(id): Path<String>,
    payload: std::result::Result<Json<UpdateActivityRequest>, JsonRejection>,
) -> Result<Json<Activity>> {
    let id = mutation_id(&id)?;
    let request = json_body(payload)?;
    let caller = state.user_service.resolve_caller(&claims).await?;

    let activity = state
        .activity_service
        .update_owned_activity(id, caller.id, request)
        .await?;

    Ok(Json(activity))
}

async fn delete_activity(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<VerifiedClaims>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let id = mutation_id(&id)?;
    let caller = state.user_service.resolve_caller(&claims).await?;

    state
        .activity_service
        .delete_owned_activity(id, caller.id)
        .await?;

    Ok(Json(DeleteResponse { success: true, id }))
}
