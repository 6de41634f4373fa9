// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! FitTrack: log workouts and browse everyone's activity feed.
//!
//! This crate provides the backend API (users, activities, photo uploads,
//! token verification) and a client library with a reducer-driven store
//! used by the `fittrack` command-line binary.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Db;
use services::{ActivityService, PhotoStore, TokenVerifier, UserService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Db,
    pub activity_service: ActivityService,
    pub user_service: UserService,
    pub token_verifier: TokenVerifier,
    pub photo_store: PhotoStore,
}

impl AppState {
    /// Wire the services on top of `db`.
    pub fn new(config: Config, db: Db, token_verifier: TokenVerifier) -> Self {
        let photo_store = PhotoStore::from_config(&config);
        Self {
            activity_service: ActivityService::new(db.clone()),
            user_service: UserService::new(db.clone()),
            config,
            db,
            token_verifier,
            photo_store,
        }
    }
}
