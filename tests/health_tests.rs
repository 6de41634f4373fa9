// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::{create_test_app, create_test_app_with_config, json_request, send};
use fittrack::config::Config;
use fittrack::routes::ClientConfig;
use tower::ServiceExt;

#[tokio::test]
async fn test_health_endpoints() {
    let (app, _state) = create_test_app();

    for uri in ["/health", "/api/health"] {
        let (status, body) = send(&app, json_request(Method::GET, uri, None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["message"], "FitTrack API is running");
        assert!(body["buildId"].is_string());
    }
}

#[tokio::test]
async fn test_client_config_reflects_server_config() {
    let config = Config {
        public_activity_feed: false,
        max_photo_bytes: 2048,
        ..Config::test_default()
    };
    let (app, _state) = create_test_app_with_config(config);

    let (status, body) = send(&app, json_request(Method::GET, "/api/config", None, None)).await;
    assert_eq!(status, StatusCode::OK);

    let config: ClientConfig = serde_json::from_value(body).unwrap();
    assert_eq!(
        config,
        ClientConfig {
            uploads_enabled: true,
            max_photo_bytes: 2048,
            public_activity_feed: false,
        }
    );
}

#[tokio::test]
async fn test_security_headers_on_api_responses() {
    let (app, _state) = create_test_app();

    // Error responses carry them too.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/activities/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("cross-origin-resource-policy").unwrap(), "same-origin");
}

#[tokio::test]
async fn test_cors_allows_frontend_origin_only() {
    let (app, state) = create_test_app();

    let preflight = |origin: &str| {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/activities")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap()
    };

    let response = app
        .clone()
        .oneshot(preflight(&state.config.frontend_url))
        .await
        .unwrap();
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        state.config.frontend_url.as_str()
    );
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .unwrap(),
        "true"
    );

    let response = app
        .clone()
        .oneshot(preflight("https://evil.example.com"))
        .await
        .unwrap();
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
