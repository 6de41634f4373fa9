// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client store driven by a scripted transport and by a live local server.

mod common;

use async_trait::async_trait;
use chrono::Utc;
use common::{create_test_app, spawn_server};
use fittrack::client::{
    ActivityDraft, ActivityUpdate, ApiClient, AuthSession, ClientError, FitTrackApi, SessionStorage, Store,
    StoredData,
};
use fittrack::models::{Activity, PublicUser};
use fittrack::routes::ClientConfig;
use fittrack::services::StoredPhoto;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

const TOKEN: &str = "fake-token";

/// In-process stand-in for the server with switchable failures.
struct FakeApi {
    user: PublicUser,
    activities: Mutex<Vec<Activity>>,
    fail_fetch: AtomicBool,
    reject_token: AtomicBool,
}

impl FakeApi {
    fn new() -> Self {
        Self {
            user: PublicUser {
                id: Uuid::new_v4(),
                email: "u1@example.com".to_string(),
            },
            activities: Mutex::new(Vec::new()),
            fail_fetch: AtomicBool::new(false),
            reject_token: AtomicBool::new(false),
        }
    }

    fn check_token(&self, token: &str) -> Result<(), ClientError> {
        if token != TOKEN || self.reject_token.load(Ordering::SeqCst) {
            return Err(ClientError::Api {
                status: 401,
                code: Some("invalid_token".to_string()),
                message: "invalid_token".to_string(),
            });
        }
        Ok(())
    }

    fn session(&self) -> AuthSession {
        AuthSession {
            user: self.user.clone(),
            token: TOKEN.to_string(),
        }
    }
}

#[async_trait]
impl FitTrackApi for FakeApi {
    async fn signup(&self, _email: &str, _password: &str) -> Result<AuthSession, ClientError> {
        Ok(self.session())
    }

    async fn login(&self, _email: &str, password: &str) -> Result<AuthSession, ClientError> {
        if password != "password123" {
            return Err(ClientError::Api {
                status: 401,
                code: Some("invalid_credentials".to_string()),
                message: "Invalid credentials".to_string(),
            });
        }
        Ok(self.session())
    }

    async fn my_activities(&self, token: &str) -> Result<Vec<Activity>, ClientError> {
        self.check_token(token)?;
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ClientError::Network("connection reset".to_string()));
        }
        Ok(self.activities.lock().unwrap().clone())
    }

    async fn all_activities(&self, _token: Option<&str>) -> Result<Vec<Activity>, ClientError> {
        Ok(self.activities.lock().unwrap().clone())
    }

    async fn get_activity(&self, id: Uuid) -> Result<Activity, ClientError> {
        self.activities
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(ClientError::Api {
                status: 404,
                code: Some("not_found".to_string()),
                message: "Activity not found".to_string(),
            })
    }

    async fn create_activity(
        &self,
        token: &str,
        draft: &ActivityDraft,
    ) -> Result<Activity, ClientError> {
        self.check_token(token)?;
        let activity = Activity {
            id: Uuid::new_v4(),
            activity_type: draft.activity_type.clone(),
            date: draft.date.clone(),
            duration: draft.duration,
            distance: draft.distance.unwrap_or(0.0),
            photo: draft.photo.clone(),
            owner_id: self.user.id,
            created_at: Utc::now(),
        };
        self.activities.lock().unwrap().insert(0, activity.clone());
        Ok(activity)
    }

    async fn update_activity(
        &self,
        token: &str,
        id: Uuid,
        update: &ActivityUpdate,
    ) -> Result<Activity, ClientError> {
        self.check_token(token)?;
        let mut activities = self.activities.lock().unwrap();
        let Some(activity) = activities.iter_mut().find(|a| a.id == id) else {
            return Err(forbidden());
        };
        if let Some(activity_type) = &update.activity_type {
            activity.activity_type = activity_type.clone();
        }
        if let Some(date) = &update.date {
            activity.date = date.clone();
        }
        if let Some(duration) = update.duration {
            activity.duration = duration;
        }
        if let Some(distance) = update.distance {
            activity.distance = distance;
        }
        if let Some(photo) = &update.photo {
            activity.photo = Some(photo.clone());
        }
        Ok(activity.clone())
    }

    async fn delete_activity(&self, token: &str, id: Uuid) -> Result<Uuid, ClientError> {
        self.check_token(token)?;
        let mut activities = self.activities.lock().unwrap();
        let before = activities.len();
        activities.retain(|a| a.id != id);
        if activities.len() == before {
            return Err(forbidden());
        }
        Ok(id)
    }

    async fn upload_photo(
        &self,
        token: &str,
        _content_type: &str,
        _bytes: Vec<u8>,
    ) -> Result<StoredPhoto, ClientError> {
        self.check_token(token)?;
        Ok(StoredPhoto {
            key: "activities/u/1-a.jpg".to_string(),
            url: "http://localhost:5000/photos/activities/u/1-a.jpg".to_string(),
        })
    }

    async fn client_config(&self) -> Result<ClientConfig, ClientError> {
        Ok(ClientConfig {
            uploads_enabled: true,
            max_photo_bytes: 1024,
            public_activity_feed: true,
        })
    }
}

fn forbidden() -> ClientError {
    ClientError::Api {
        status: 403,
        code: Some("forbidden".to_string()),
        message: "Not allowed to modify this activity".to_string(),
    }
}

fn draft(activity_type: &str) -> ActivityDraft {
    ActivityDraft {
        activity_type: activity_type.to_string(),
        date: "2024-01-15".to_string(),
        duration: 30,
        distance: None,
        photo: None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scripted transport
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_survives_failed_follow_up_fetch() {
    let api = FakeApi::new();
    api.fail_fetch.store(true, Ordering::SeqCst);
    let mut store = Store::new(api, SessionStorage::in_memory());

    store.login("u1@example.com", "password123").await.unwrap();

    let state = store.state();
    assert!(state.is_authenticated());
    assert!(!state.loading);
    assert_eq!(state.error.as_deref(), Some("network error: connection reset"));

    store.clear_error();
    assert_eq!(store.state().error, None);
    assert!(store.state().is_authenticated());
}

#[tokio::test]
async fn test_failed_login_sets_error_and_stays_logged_out() {
    let mut store = Store::new(FakeApi::new(), SessionStorage::in_memory());

    let err = store.login("u1@example.com", "wrong-password").await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(!store.state().is_authenticated());
    assert_eq!(store.state().error.as_deref(), Some("Invalid credentials"));
}

#[tokio::test]
async fn test_create_prepends_and_delete_removes() {
    let mut store = Store::new(FakeApi::new(), SessionStorage::in_memory());
    store.signup("u1@example.com", "password123").await.unwrap();

    let first = store.create_activity(draft("Course")).await.unwrap();
    let second = store.create_activity(draft("Gym")).await.unwrap();

    let ids: Vec<_> = store.state().activities.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    store.delete_activity(first.id).await.unwrap();
    let ids: Vec<_> = store.state().activities.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![second.id]);

    // A rejected delete leaves the list alone.
    let err = store.delete_activity(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert_eq!(store.state().activities.len(), 1);
    assert!(store.state().error.is_some());
}

#[tokio::test]
async fn test_update_replaces_entry_in_place() {
    let mut store = Store::new(FakeApi::new(), SessionStorage::in_memory());
    store.signup("u1@example.com", "password123").await.unwrap();

    let oldest = store.create_activity(draft("Course")).await.unwrap();
    let middle = store.create_activity(draft("Marche")).await.unwrap();
    let newest = store.create_activity(draft("Gym")).await.unwrap();

    let updated = store
        .update_activity(
            middle.id,
            ActivityUpdate {
                duration: Some(75),
                distance: Some(6.5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.id, middle.id);
    assert_eq!(updated.activity_type, "Marche");

    let state = store.state();
    let ids: Vec<_> = state.activities.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![newest.id, middle.id, oldest.id]);
    assert_eq!(state.activities[1], updated);
    assert_eq!(state.activities[1].duration, 75);
    assert_eq!(state.activities[1].distance, 6.5);
    assert_eq!(state.error, None);
    assert!(!state.loading);
}

#[tokio::test]
async fn test_rejected_update_leaves_list_unchanged() {
    let mut store = Store::new(FakeApi::new(), SessionStorage::in_memory());
    store.signup("u1@example.com", "password123").await.unwrap();
    store.create_activity(draft("Course")).await.unwrap();
    store.create_activity(draft("Vélo")).await.unwrap();
    let before = store.state().activities.clone();

    let err = store
        .update_activity(
            Uuid::new_v4(),
            ActivityUpdate {
                duration: Some(10),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(403));

    let state = store.state();
    assert_eq!(state.activities, before);
    assert_eq!(state.error.as_deref(), Some("Not allowed to modify this activity"));
    assert!(!state.loading);
}

#[tokio::test]
async fn test_operations_without_session_fail() {
    let mut store = Store::new(FakeApi::new(), SessionStorage::in_memory());

    let err = store.create_activity(draft("Course")).await.unwrap_err();
    assert!(matches!(err, ClientError::NotLoggedIn));
    assert_eq!(store.state().error.as_deref(), Some("Not logged in"));
    assert!(store.state().activities.is_empty());

    assert!(matches!(
        store.upload_photo("image/jpeg", vec![1]).await,
        Err(ClientError::NotLoggedIn)
    ));
}

#[tokio::test]
async fn test_session_is_persisted_and_restored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let mut store = Store::new(FakeApi::new(), SessionStorage::file(&path));
    store.login("u1@example.com", "password123").await.unwrap();
    let created = store.create_activity(draft("Marche")).await.unwrap();
    let user = store.state().user.clone();

    let storage = SessionStorage::file(&path);
    assert_eq!(storage.token().as_deref(), Some(TOKEN));
    assert_eq!(
        storage.load_data(),
        Some(StoredData {
            user: user.clone(),
            activities: vec![created.clone()],
        })
    );

    // The server's list wins over the cached one.
    let api = FakeApi::new();
    let mut restored = Store::new(api, SessionStorage::file(&path));
    assert!(restored.restore_session().await.unwrap());
    assert_eq!(restored.state().user, user);
    assert_eq!(restored.state().token.as_deref(), Some(TOKEN));
    assert!(restored.state().activities.is_empty());
}

#[tokio::test]
async fn test_rejected_restore_clears_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let mut store = Store::new(FakeApi::new(), SessionStorage::file(&path));
    store.login("u1@example.com", "password123").await.unwrap();

    let api = FakeApi::new();
    api.reject_token.store(true, Ordering::SeqCst);
    let mut restored = Store::new(api, SessionStorage::file(&path));

    let err = restored.restore_session().await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(!restored.state().is_authenticated());
    assert_eq!(SessionStorage::file(&path).token(), None);

    // Nothing left to restore.
    let mut again = Store::new(FakeApi::new(), SessionStorage::file(&path));
    assert!(!again.restore_session().await.unwrap());
}

#[tokio::test]
async fn test_restore_keeps_session_when_server_unreachable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let mut store = Store::new(FakeApi::new(), SessionStorage::file(&path));
    store.login("u1@example.com", "password123").await.unwrap();
    let created = store.create_activity(draft("Natation")).await.unwrap();
    let user = store.state().user.clone();

    let api = FakeApi::new();
    api.fail_fetch.store(true, Ordering::SeqCst);
    let mut restored = Store::new(api, SessionStorage::file(&path));

    let err = restored.restore_session().await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));

    // Still logged in with the cached list, and the failure is visible.
    let state = restored.state();
    assert!(state.is_authenticated());
    assert_eq!(state.user, user);
    assert_eq!(state.activities, vec![created]);
    assert_eq!(state.error.as_deref(), Some("network error: connection reset"));
    assert!(!state.loading);
    assert_eq!(SessionStorage::file(&path).token().as_deref(), Some(TOKEN));

    // Once the server is back the same token works.
    let mut later = Store::new(FakeApi::new(), SessionStorage::file(&path));
    assert!(later.restore_session().await.unwrap());
}

#[tokio::test]
async fn test_logout_forgets_everything() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let mut store = Store::new(FakeApi::new(), SessionStorage::file(&path));
    store.login("u1@example.com", "password123").await.unwrap();
    store.create_activity(draft("Course")).await.unwrap();

    store.logout();

    assert_eq!(store.state(), &Default::default());
    let storage = SessionStorage::file(&path);
    assert_eq!(storage.token(), None);
    assert_eq!(storage.load_data(), Some(StoredData::default()));
}

// ─────────────────────────────────────────────────────────────────────────────
// Live server
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_store_against_local_server() {
    let (app, _state) = create_test_app();
    let base_url = spawn_server(app).await;

    let api = ApiClient::new(&format!("{base_url}/")).unwrap();
    assert_eq!(api.base_url(), base_url);
    let mut store = Store::new(api, SessionStorage::in_memory());

    store.signup("u1@example.com", "password123").await.unwrap();
    assert!(store.state().is_authenticated());
    assert!(store.state().activities.is_empty());
    assert_eq!(store.state().error, None);

    let photo = store
        .upload_photo("image/png", vec![0x89, b'P', b'N', b'G'])
        .await
        .unwrap();
    assert!(photo.url.ends_with(&photo.key));

    let created = store
        .create_activity(ActivityDraft {
            photo: Some(photo.url.clone()),
            distance: Some(5.0),
            ..draft("Course")
        })
        .await
        .unwrap();
    assert_eq!(created.distance, 5.0);
    assert_eq!(created.photo.as_deref(), Some(photo.url.as_str()));
    assert_eq!(store.state().activities.len(), 1);

    let fetched = store.api().get_activity(created.id).await.unwrap();
    assert_eq!(fetched.id, created.id);

    let all = store.all_activities().await.unwrap();
    assert_eq!(all.len(), 1);

    // Server-side validation surfaces as the error message.
    let err = store
        .create_activity(ActivityDraft {
            date: String::new(),
            ..draft("Course")
        })
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.to_string(), "Date is required");
    assert_eq!(store.state().error.as_deref(), Some("Date is required"));

    let updated = store
        .update_activity(
            created.id,
            ActivityUpdate {
                activity_type: Some("Vélo".to_string()),
                duration: Some(42),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.activity_type, "Vélo");
    assert_eq!(updated.duration, 42);
    assert_eq!(updated.distance, 5.0);
    assert_eq!(store.state().activities, vec![updated]);

    store.delete_activity(created.id).await.unwrap();
    assert!(store.state().activities.is_empty());

    let config = store.api().client_config_or_default().await;
    assert!(config.uploads_enabled);
    assert!(config.public_activity_feed);
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let api = ApiClient::new("http://127.0.0.1:9").unwrap();
    let mut store = Store::new(api, SessionStorage::in_memory());

    let err = store.login("u1@example.com", "password123").await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));
    assert!(!store.state().loading);

    let config = store.api().client_config_or_default().await;
    assert!(!config.uploads_enabled);
}
