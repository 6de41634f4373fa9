// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! FitTrack API Server
//!
//! Serves the activity API, photo uploads and session endpoints.

use anyhow::Context;
use fittrack::{config::Config, db::Db, services::TokenVerifier, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(port = config.port, "Starting FitTrack API");

    let db = Db::connect(&config)
        .await
        .context("Failed to connect to database")?;
    tracing::info!(backend = db.backend_name(), "Database ready");

    if config.seed_demo_data {
        let inserted = fittrack::db::seed::seed_demo_data(&db)
            .await
            .context("Failed to seed demo data")?;
        tracing::info!(inserted, "Demo data loaded");
    }

    let token_verifier =
        TokenVerifier::new(&config).context("Failed to initialize token verifier")?;
    if config.identity_provider.is_none() {
        tracing::info!("No identity provider configured, accepting session tokens only");
    }

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), db, token_verifier));

    // Build router
    let app = fittrack::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fittrack=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .try_init()?;
    Ok(())
}
