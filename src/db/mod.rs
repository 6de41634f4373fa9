// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! [`Db`] is a cheap-to-clone handle over one of two backends with the same
//! semantics:
//! - PostgreSQL (production), via `sqlx`
//! - an in-memory store (local development and tests)
//!
//! Every ownership-guarded mutation is a single conditional operation keyed
//! on `(id, owner_id)` and reports how many records it touched, so callers
//! never need a separate fetch to check ownership.

pub mod memory;
pub mod postgres;
pub mod seed;

use std::sync::Arc;

use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::models::{Activity, ActivityPatch, NewActivity, User};

pub use memory::MemoryStore;

#[derive(Clone)]
enum Backend {
    Postgres(PgPool),
    Memory(Arc<MemoryStore>),
}

/// Database handle.
#[derive(Clone)]
pub struct Db {
    backend: Backend,
}

impl Db {
    /// Connect to the backend selected by `config.database_url`.
    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        match &config.database_url {
            Some(url) => Self::connect_postgres(url).await,
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory store (data is not persisted)");
                Ok(Self::new_in_memory())
            }
        }
    }

    /// Connect to PostgreSQL and run the embedded migrations.
    pub async fn connect_postgres(url: &str) -> Result<Self, AppError> {
        let pool = PgPool::connect(url)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to PostgreSQL: {}", e)))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Database(format!("Migration failed: {}", e)))?;

        tracing::info!("Connected to PostgreSQL, migrations applied");

        Ok(Self {
            backend: Backend::Postgres(pool),
        })
    }

    /// Create an empty in-memory database.
    pub fn new_in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(MemoryStore::default())),
        }
    }

    /// Short backend name for logs and health output.
    pub fn backend_name(&self) -> &'static str {
        match &self.backend {
            Backend::Postgres(_) => "postgres",
            Backend::Memory(_) => "memory",
        }
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Insert a new user.
    ///
    /// Fails with [`AppError::Conflict`] when the email is already taken.
    pub async fn create_user(
        &self,
        email: &str,
        password_hash: Option<&str>,
    ) -> Result<User, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::create_user(pool, email, password_hash).await,
            Backend::Memory(store) => store.create_user(email, password_hash),
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::find_user_by_email(pool, email).await,
            Backend::Memory(store) => Ok(store.find_user_by_email(email)),
        }
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::get_user(pool, id).await,
            Backend::Memory(store) => Ok(store.get_user(id)),
        }
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::list_users(pool).await,
            Backend::Memory(store) => Ok(store.list_users()),
        }
    }

    /// Delete a user and, with them, all of their activities.
    ///
    /// Returns `false` if no such user existed.
    pub async fn delete_user(&self, id: Uuid) -> Result<bool, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::delete_user(pool, id).await,
            Backend::Memory(store) => Ok(store.delete_user(id)),
        }
    }

    // ─── Activity Operations ─────────────────────────────────────

    pub async fn insert_activity(&self, new: NewActivity) -> Result<Activity, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::insert_activity(pool, new).await,
            Backend::Memory(store) => store.insert_activity(new),
        }
    }

    pub async fn get_activity(&self, id: Uuid) -> Result<Option<Activity>, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::get_activity(pool, id).await,
            Backend::Memory(store) => Ok(store.get_activity(id)),
        }
    }

    /// All activities of one owner, newest first.
    pub async fn list_activities_for_owner(&self, owner_id: Uuid) -> Result<Vec<Activity>, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::list_activities(pool, Some(owner_id)).await,
            Backend::Memory(store) => Ok(store.list_activities(Some(owner_id))),
        }
    }

    /// Every activity, newest first.
    pub async fn list_all_activities(&self) -> Result<Vec<Activity>, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::list_activities(pool, None).await,
            Backend::Memory(store) => Ok(store.list_activities(None)),
        }
    }

    /// Unconditional delete. Returns the number of rows removed (0 or 1).
    pub async fn delete_activity(&self, id: Uuid) -> Result<u64, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::delete_activity(pool, id, None).await,
            Backend::Memory(store) => Ok(store.delete_activity(id, None)),
        }
    }

    /// Delete only if `owner_id` owns the activity. Returns rows removed.
    pub async fn delete_activity_owned(&self, id: Uuid, owner_id: Uuid) -> Result<u64, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::delete_activity(pool, id, Some(owner_id)).await,
            Backend::Memory(store) => Ok(store.delete_activity(id, Some(owner_id))),
        }
    }

    /// Update only if `owner_id` owns the activity. `None` when nothing matched.
    pub async fn update_activity_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        patch: &ActivityPatch,
    ) -> Result<Option<Activity>, AppError> {
        match &self.backend {
            Backend::Postgres(pool) => postgres::update_activity_owned(pool, id, owner_id, patch).await,
            Backend::Memory(store) => Ok(store.update_activity_owned(id, owner_id, patch)),
        }
    }
}
