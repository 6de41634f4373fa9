// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client library: API transport, local session storage and the view store.

pub mod api;
pub mod storage;
pub mod store;

pub use api::{ActivityDraft, ActivityUpdate, ApiClient, AuthSession, ClientError, FitTrackApi};
pub use storage::{SessionStorage, StoredData};
pub use store::{reduce, Action, ClientState, Phase, Store};
