// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PostgreSQL queries.

use chrono::Utc;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Activity, ActivityPatch, NewActivity, User};

const ACTIVITY_COLUMNS: &str =
    "id, activity_type, date, duration, distance, photo, owner_id, created_at";

fn db_err(e: sqlx::Error) -> AppError {
    AppError::Database(e.to_string())
}

// ─── Users ───────────────────────────────────────────────────────

pub async fn create_user(
    pool: &PgPool,
    email: &str,
    password_hash: Option<&str>,
) -> Result<User, AppError> {
    let result = sqlx::query_as::<_, User>(
        "INSERT INTO users (id, email, password_hash, created_at) VALUES ($1, $2, $3, $4) \
         RETURNING id, email, password_hash, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(Utc::now())
    .fetch_one(pool)
    .await;

    match result {
        Ok(user) => Ok(user),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Conflict(
            "User already exists".to_string(),
        )),
        Err(e) => Err(db_err(e)),
    }
}

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, AppError> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, password_hash, created_at FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
    .map_err(db_err)
}

pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<Option<User>, AppError> {
    sqlx::query_as::<_, User>("SELECT id, email, password_hash, created_at FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_err)
}

pub async fn list_users(pool: &PgPool) -> Result<Vec<User>, AppError> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, password_hash, created_at FROM users ORDER BY created_at",
    )
    .fetch_all(pool)
    .await
    .map_err(db_err)
}

/// Activities go with the user through `ON DELETE CASCADE`.
pub async fn delete_user(pool: &PgPool, id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(db_err)?;
    Ok(result.rows_affected() > 0)
}

// ─── Activities ──────────────────────────────────────────────────

pub async fn insert_activity(pool: &PgPool, new: NewActivity) -> Result<Activity, AppError> {
    let activity = Activity::from_new(new, Utc::now());

    let sql = format!(
        "INSERT INTO activities ({ACTIVITY_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {ACTIVITY_COLUMNS}"
    );

    let result = sqlx::query_as::<_, Activity>(&sql)
        .bind(activity.id)
        .bind(&activity.activity_type)
        .bind(&activity.date)
        .bind(activity.duration)
        .bind(activity.distance)
        .bind(&activity.photo)
        .bind(activity.owner_id)
        .bind(activity.created_at)
        .fetch_one(pool)
        .await;

    match result {
        Ok(stored) => Ok(stored),
        Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => Err(
            AppError::BadRequest(format!("Owner {} does not exist", activity.owner_id)),
        ),
        Err(e) => Err(db_err(e)),
    }
}

pub async fn get_activity(pool: &PgPool, id: Uuid) -> Result<Option<Activity>, AppError> {
    let sql = format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = $1");
    sqlx::query_as::<_, Activity>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(db_err)
}

/// List activities newest first, optionally restricted to one owner.
pub async fn list_activities(
    pool: &PgPool,
    owner_id: Option<Uuid>,
) -> Result<Vec<Activity>, AppError> {
    let rows = match owner_id {
        Some(owner_id) => {
            let sql = format!(
                "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE owner_id = $1 \
                 ORDER BY created_at DESC, seq DESC"
            );
            sqlx::query_as::<_, Activity>(&sql)
                .bind(owner_id)
                .fetch_all(pool)
                .await
        }
        None => {
            let sql = format!(
                "SELECT {ACTIVITY_COLUMNS} FROM activities ORDER BY created_at DESC, seq DESC"
            );
            sqlx::query_as::<_, Activity>(&sql).fetch_all(pool).await
        }
    };

    rows.map_err(db_err)
}

/// Delete by id, and by owner too when one is given. Returns rows removed.
pub async fn delete_activity(
    pool: &PgPool,
    id: Uuid,
    owner_id: Option<Uuid>,
) -> Result<u64, AppError> {
    let result = match owner_id {
        Some(owner_id) => {
            sqlx::query("DELETE FROM activities WHERE id = $1 AND owner_id = $2")
                .bind(id)
                .bind(owner_id)
                .execute(pool)
                .await
        }
        None => {
            sqlx::query("DELETE FROM activities WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await
        }
    }
    .map_err(db_err)?;

    Ok(result.rows_affected())
}

pub async fn update_activity_owned(
    pool: &PgPool,
    id: Uuid,
    owner_id: Uuid,
    patch: &ActivityPatch,
) -> Result<Option<Activity>, AppError> {
    let sql = format!(
        "UPDATE activities SET \
             activity_type = COALESCE($3, activity_type), \
             date = COALESCE($4, date), \
             duration = COALESCE($5, duration), \
             distance = COALESCE($6, distance), \
             photo = COALESCE($7, photo) \
         WHERE id = $1 AND owner_id = $2 \
         RETURNING {ACTIVITY_COLUMNS}"
    );

    sqlx::query_as::<_, Activity>(&sql)
        .bind(id)
        .bind(owner_id)
        .bind(&patch.activity_type)
        .bind(&patch.date)
        .bind(patch.duration)
        .bind(patch.distance)
        .bind(&patch.photo)
        .fetch_optional(pool)
        .await
        .map_err(db_err)
}
