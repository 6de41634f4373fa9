// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use fittrack::config::Config;
use fittrack::db::Db;
use fittrack::routes::create_router;
use fittrack::services::TokenVerifier;
use fittrack::AppState;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

/// Check if a PostgreSQL database is available via environment variable.
#[allow(dead_code)]
pub fn database_available() -> bool {
    std::env::var("TEST_DATABASE_URL").is_ok()
}

/// Skip test with message if no database is available.
#[macro_export]
macro_rules! require_database {
    () => {
        if !crate::common::database_available() {
            eprintln!("⚠️  Skipping: TEST_DATABASE_URL not set");
            return;
        }
    };
}

/// Connect to the test database and run migrations.
#[allow(dead_code)]
pub async fn test_db() -> Db {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL not set");
    Db::connect_postgres(&url)
        .await
        .expect("Failed to connect to test database")
}

/// Create a test app backed by the in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (Router, Arc<AppState>) {
    create_test_app_with_config(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> (Router, Arc<AppState>) {
    let verifier = TokenVerifier::new(&config).expect("Failed to build token verifier");
    create_test_app_with(config, Db::new_in_memory(), verifier)
}

#[allow(dead_code)]
pub fn create_test_app_with(
    config: Config,
    db: Db,
    verifier: TokenVerifier,
) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config, db, verifier));
    (create_router(state.clone()), state)
}

/// Create a session token the way the login handler does.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: Uuid, email: &str, signing_key: &[u8]) -> String {
    fittrack::middleware::auth::create_jwt(user_id, email, signing_key)
        .expect("Failed to create test JWT")
}

/// Build a request with an optional bearer token and JSON body.
#[allow(dead_code)]
pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send a request and decode the JSON response (`Value::Null` for an empty body).
#[allow(dead_code)]
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

/// Sign up through the API and return the new user's id and token.
#[allow(dead_code)]
pub async fn signup(app: &Router, email: &str, password: &str) -> (Uuid, String) {
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/api/auth/signup",
            None,
            Some(serde_json::json!({ "email": email, "password": password })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");

    let id = Uuid::parse_str(body["user"]["id"].as_str().unwrap()).unwrap();
    let token = body["token"].as_str().unwrap().to_string();
    (id, token)
}

/// Serve the app on an ephemeral local port and return its base URL.
#[allow(dead_code)]
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
