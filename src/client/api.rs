// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP transport for the FitTrack API.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Activity, PublicUser};
use crate::routes::activities::DeleteResponse;
use crate::routes::ClientConfig;
use crate::services::StoredPhoto;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Client-side failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// The server answered with an error body.
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("Not logged in")]
    NotLoggedIn,
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Token and user returned by signup/login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: PublicUser,
    pub token: String,
}

/// Fields the user fills in for a new activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityDraft {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub date: String,
    pub duration: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

/// Fields to change on an existing activity. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActivityUpdate {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

impl ActivityUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Every server call the client store makes.
#[async_trait]
pub trait FitTrackApi: Send + Sync {
    async fn signup(&self, email: &str, password: &str) -> Result<AuthSession, ClientError>;

    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ClientError>;

    /// The caller's own activities, newest first.
    async fn my_activities(&self, token: &str) -> Result<Vec<Activity>, ClientError>;

    /// Everyone's activities. The token is only needed when the server keeps
    /// the feed private.
    async fn all_activities(&self, token: Option<&str>) -> Result<Vec<Activity>, ClientError>;

    async fn get_activity(&self, id: Uuid) -> Result<Activity, ClientError>;

    async fn create_activity(
        &self,
        token: &str,
        draft: &ActivityDraft,
    ) -> Result<Activity, ClientError>;

    /// Only the owner may update; the server answers 403 otherwise.
    async fn update_activity(
        &self,
        token: &str,
        id: Uuid,
        update: &ActivityUpdate,
    ) -> Result<Activity, ClientError>;

    /// Returns the id the server confirmed as deleted.
    async fn delete_activity(&self, token: &str, id: Uuid) -> Result<Uuid, ClientError>;

    async fn upload_photo(
        &self,
        token: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredPhoto, ClientError>;

    async fn client_config(&self) -> Result<ClientConfig, ClientError>;
}

/// Error body sent by the server.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    details: Option<String>,
    message: Option<String>,
}

/// `reqwest` implementation of [`FitTrackApi`].
#[derive(Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building API HTTP client")?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let builder = self
            .http_client
            .request(method, format!("{}{}", self.base_url, path));
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// Server config, or the defaults if the server cannot be asked.
    pub async fn client_config_or_default(&self) -> ClientConfig {
        match self.client_config().await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load remote config, using defaults");
                ClientConfig {
                    uploads_enabled: false,
                    max_photo_bytes: 5 * 1024 * 1024,
                    public_activity_feed: true,
                }
            }
        }
    }
}

/// Turn a non-2xx response into [`ClientError::Api`].
async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.json::<ErrorBody>().await.ok();
    Err(api_error(status, body))
}

fn api_error(status: StatusCode, body: Option<ErrorBody>) -> ClientError {
    let (code, message) = match body {
        Some(body) => {
            let message = body
                .details
                .or(body.message)
                .or_else(|| body.error.clone())
                .unwrap_or_else(|| format!("API error: {}", status.as_u16()));
            (body.error, message)
        }
        None => (None, format!("API error: {}", status.as_u16())),
    };

    ClientError::Api {
        status: status.as_u16(),
        code,
        message,
    }
}

#[derive(Serialize)]
struct CredentialsBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[async_trait]
impl FitTrackApi for ApiClient {
    async fn signup(&self, email: &str, password: &str) -> Result<AuthSession, ClientError> {
        self.send(
            self.request(Method::POST, "/api/auth/signup", None)
                .json(&CredentialsBody { email, password }),
        )
        .await
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ClientError> {
        self.send(
            self.request(Method::POST, "/api/auth/login", None)
                .json(&CredentialsBody { email, password }),
        )
        .await
    }

    async fn my_activities(&self, token: &str) -> Result<Vec<Activity>, ClientError> {
        self.send(self.request(Method::GET, "/api/activities/me", Some(token)))
            .await
    }

    async fn all_activities(&self, token: Option<&str>) -> Result<Vec<Activity>, ClientError> {
        self.send(self.request(Method::GET, "/api/activities", token))
            .await
    }

    async fn get_activity(&self, id: Uuid) -> Result<Activity, ClientError> {
        self.send(self.request(Method::GET, &format!("/api/activities/{id}"), None))
            .await
    }

    async fn create_activity(
        &self,
        token: &str,
        draft: &ActivityDraft,
    ) -> Result<Activity, ClientError> {
        self.send(
            self.request(Method::POST, "/api/activities", Some(token))
                .json(draft),
        )
        .await
    }

    async fn update_activity(
        &self,
        token: &str,
        id: Uuid,
        update: &ActivityUpdate,
    ) -> Result<Activity, ClientError> {
        self.send(
            self.request(Method::PUT, &format!("/api/activities/{id}"), Some(token))
                .json(update),
        )
        .await
    }

    async fn delete_activity(&self, token: &str, id: Uuid) -> Result<Uuid, ClientError> {
        let response: DeleteResponse = self
            .send(self.request(Method::DELETE, &format!("/api/activities/{id}"), Some(token)))
            .await?;
        Ok(response.id)
    }

    async fn upload_photo(
        &self,
        token: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredPhoto, ClientError> {
        self.send(
            self.request(Method::POST, "/api/uploads", Some(token))
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(bytes),
        )
        .await
    }

    async fn client_config(&self) -> Result<ClientConfig, ClientError> {
        self.send(self.request(Method::GET, "/api/config", None))
            .await
    }
}
