// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod user;

pub use activity::{Activity, ActivityPatch, NewActivity, KNOWN_ACTIVITY_TYPES};
pub use user::{PublicUser, User};
