// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client view state.
//!
//! [`ClientState`] only changes through [`reduce`]. Each async operation
//! dispatches `Pending` before its network call and then either `Fulfilled`
//! with that operation's own payload type or `Rejected` with a message.
//! Nothing is applied optimistically, so a rejection never has to roll
//! anything back.

use uuid::Uuid;

use crate::client::api::{ActivityDraft, ActivityUpdate, AuthSession, ClientError, FitTrackApi};
use crate::client::storage::{SessionStorage, StoredData};
use crate::models::{Activity, PublicUser};
use crate::services::StoredPhoto;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientState {
    pub user: Option<PublicUser>,
    pub token: Option<String>,
    /// The logged-in user's activities, newest first.
    pub activities: Vec<Activity>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ClientState {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.is_some()
    }
}

/// Phase of one async operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase<T> {
    Pending,
    Fulfilled(T),
    Rejected(String),
}

/// Result of validating a persisted session at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredSession {
    pub user: Option<PublicUser>,
    pub token: String,
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    FetchActivities(Phase<Vec<Activity>>),
    CreateActivity(Phase<Activity>),
    UpdateActivity(Phase<Activity>),
    DeleteActivity(Phase<Uuid>),
    Signup(Phase<AuthSession>),
    Login(Phase<AuthSession>),
    RestoreSession(Phase<RestoredSession>),
    Logout,
    ClearError,
}

impl Action {
    /// Whether the action changes anything worth persisting.
    fn touches_session(&self) -> bool {
        !matches!(
            self,
            Action::ClearError
                | Action::FetchActivities(Phase::Pending)
                | Action::CreateActivity(Phase::Pending)
                | Action::UpdateActivity(Phase::Pending)
                | Action::DeleteActivity(Phase::Pending)
                | Action::Signup(Phase::Pending)
                | Action::Login(Phase::Pending)
                | Action::RestoreSession(Phase::Pending)
        )
    }
}

fn apply<T>(
    mut state: ClientState,
    phase: Phase<T>,
    on_fulfilled: impl FnOnce(&mut ClientState, T),
) -> ClientState {
    match phase {
        Phase::Pending => {
            state.loading = true;
            state.error = None;
        }
        Phase::Fulfilled(payload) => {
            on_fulfilled(&mut state, payload);
            state.loading = false;
            state.error = None;
        }
        Phase::Rejected(message) => {
            state.loading = false;
            state.error = Some(message);
        }
    }
    state
}

fn start_session(state: &mut ClientState, session: AuthSession) {
    if state.user.as_ref().map(|u| u.id) != Some(session.user.id) {
        // Someone else's cached list must not leak into this session.
        state.activities.clear();
    }
    state.user = Some(session.user);
    state.token = Some(session.token);
}

/// The only place [`ClientState`] changes.
pub fn reduce(state: ClientState, action: Action) -> ClientState {
    match action {
        Action::FetchActivities(phase) => apply(state, phase, |s, activities| {
            s.activities = activities;
        }),
        Action::CreateActivity(phase) => apply(state, phase, |s, activity| {
            s.activities.insert(0, activity);
        }),
        Action::UpdateActivity(phase) => apply(state, phase, |s, activity| {
            // Position is kept; an update never moves an entry in the list.
            if let Some(slot) = s.activities.iter_mut().find(|a| a.id == activity.id) {
                *slot = activity;
            }
        }),
        Action::DeleteActivity(phase) => apply(state, phase, |s, id| {
            s.activities.retain(|a| a.id != id);
        }),
        Action::Signup(phase) | Action::Login(phase) => apply(state, phase, start_session),
        Action::RestoreSession(phase) => {
            let failed = matches!(phase, Phase::Rejected(_));
            let mut state = apply(state, phase, |s, restored| {
                s.user = restored.user;
                s.token = Some(restored.token);
                s.activities = restored.activities;
            });
            if failed {
                state.user = None;
                state.token = None;
                state.activities.clear();
            }
            state
        }
        Action::Logout => ClientState::default(),
        Action::ClearError => ClientState {
            error: None,
            ..state
        },
    }
}

/// Holds the state and runs the async operations against an API transport.
pub struct Store<A> {
    api: A,
    storage: SessionStorage,
    state: ClientState,
}

impl<A: FitTrackApi> Store<A> {
    pub fn new(api: A, storage: SessionStorage) -> Self {
        Self {
            api,
            storage,
            state: ClientState::default(),
        }
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn dispatch(&mut self, action: Action) {
        let persist = action.touches_session();
        self.state = reduce(std::mem::take(&mut self.state), action);
        if persist {
            self.persist();
        }
    }

    /// Last write wins; the server stays the source of truth.
    fn persist(&mut self) {
        match &self.state.token {
            Some(token) => self.storage.set_token(token),
            None => self.storage.clear_token(),
        }
        self.storage.save_data(&StoredData {
            user: self.state.user.clone(),
            activities: self.state.activities.clone(),
        });
    }

    fn token(&self) -> Result<String, ClientError> {
        self.state.token.clone().ok_or(ClientError::NotLoggedIn)
    }

    /// Reload the caller's activities.
    pub async fn fetch_activities(&mut self) -> Result<(), ClientError> {
        self.dispatch(Action::FetchActivities(Phase::Pending));
        let result = match self.token() {
            Ok(token) => self.api.my_activities(&token).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(activities) => {
                self.dispatch(Action::FetchActivities(Phase::Fulfilled(activities)));
                Ok(())
            }
            Err(e) => {
                self.dispatch(Action::FetchActivities(Phase::Rejected(e.to_string())));
                Err(e)
            }
        }
    }

    pub async fn create_activity(&mut self, draft: ActivityDraft) -> Result<Activity, ClientError> {
        self.dispatch(Action::CreateActivity(Phase::Pending));
        let result = match self.token() {
            Ok(token) => self.api.create_activity(&token, &draft).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(activity) => {
                self.dispatch(Action::CreateActivity(Phase::Fulfilled(activity.clone())));
                Ok(activity)
            }
            Err(e) => {
                self.dispatch(Action::CreateActivity(Phase::Rejected(e.to_string())));
                Err(e)
            }
        }
    }

    pub async fn update_activity(
        &mut self,
        id: Uuid,
        update: ActivityUpdate,
    ) -> Result<Activity, ClientError> {
        self.dispatch(Action::UpdateActivity(Phase::Pending));
        let result = match self.token() {
            Ok(token) => self.api.update_activity(&token, id, &update).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(activity) => {
                self.dispatch(Action::UpdateActivity(Phase::Fulfilled(activity.clone())));
                Ok(activity)
            }
            Err(e) => {
                self.dispatch(Action::UpdateActivity(Phase::Rejected(e.to_string())));
                Err(e)
            }
        }
    }

    pub async fn delete_activity(&mut self, id: Uuid) -> Result<(), ClientError> {
        self.dispatch(Action::DeleteActivity(Phase::Pending));
        let result = match self.token() {
            Ok(token) => self.api.delete_activity(&token, id).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(deleted) => {
                self.dispatch(Action::DeleteActivity(Phase::Fulfilled(deleted)));
                Ok(())
            }
            Err(e) => {
                self.dispatch(Action::DeleteActivity(Phase::Rejected(e.to_string())));
                Err(e)
            }
        }
    }

    /// Create an account, then load its activities.
    ///
    /// Only a failed signup is an error. If the follow-up fetch fails the
    /// user stays logged in and the message is left in `state().error`.
    pub async fn signup(&mut self, email: &str, password: &str) -> Result<(), ClientError> {
        self.dispatch(Action::Signup(Phase::Pending));
        match self.api.signup(email, password).await {
            Ok(session) => self.dispatch(Action::Signup(Phase::Fulfilled(session))),
            Err(e) => {
                self.dispatch(Action::Signup(Phase::Rejected(e.to_string())));
                return Err(e);
            }
        }
        self.follow_up_fetch().await;
        Ok(())
    }

    /// Log in, then load the user's activities. Same failure rules as
    /// [`Store::signup`].
    pub async fn login(&mut self, email: &str, password: &str) -> Result<(), ClientError> {
        self.dispatch(Action::Login(Phase::Pending));
        match self.api.login(email, password).await {
            Ok(session) => self.dispatch(Action::Login(Phase::Fulfilled(session))),
            Err(e) => {
                self.dispatch(Action::Login(Phase::Rejected(e.to_string())));
                return Err(e);
            }
        }
        self.follow_up_fetch().await;
        Ok(())
    }

    async fn follow_up_fetch(&mut self) {
        if let Err(e) = self.fetch_activities().await {
            tracing::warn!(error = %e, "Logged in but could not load activities");
        }
    }

    pub fn logout(&mut self) {
        self.dispatch(Action::Logout);
    }

    pub fn clear_error(&mut self) {
        self.dispatch(Action::ClearError);
    }

    /// Pick up a persisted session, checking the token with the server.
    ///
    /// Returns `Ok(false)` when nothing was persisted. Only a token the
    /// server answers 401 for is dropped. Any other failure keeps the
    /// session with the cached activities, records the error in
    /// `state().error` and is still returned.
    pub async fn restore_session(&mut self) -> Result<bool, ClientError> {
        let Some(token) = self.storage.token() else {
            return Ok(false);
        };
        let cached = self.storage.load_data().unwrap_or_default();

        self.dispatch(Action::RestoreSession(Phase::Pending));
        match self.api.my_activities(&token).await {
            Ok(activities) => {
                self.dispatch(Action::RestoreSession(Phase::Fulfilled(RestoredSession {
                    user: cached.user,
                    token,
                    activities,
                })));
                Ok(true)
            }
            Err(e) if e.status() == Some(401) => {
                self.dispatch(Action::RestoreSession(Phase::Rejected(e.to_string())));
                Err(e)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not validate saved session, keeping it");
                self.dispatch(Action::RestoreSession(Phase::Fulfilled(RestoredSession {
                    user: cached.user,
                    token,
                    activities: cached.activities,
                })));
                self.dispatch(Action::FetchActivities(Phase::Rejected(e.to_string())));
                Err(e)
            }
        }
    }

    /// Everyone's activities. Not part of the view state.
    pub async fn all_activities(&self) -> Result<Vec<Activity>, ClientError> {
        self.api.all_activities(self.state.token.as_deref()).await
    }

    /// Upload a photo for a later `create_activity`.
    pub async fn upload_photo(
        &self,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredPhoto, ClientError> {
        let token = self.token()?;
        self.api.upload_photo(&token, content_type, bytes).await
    }
}
