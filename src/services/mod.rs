// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod activity;
pub mod identity;
pub mod password;
pub mod photos;
pub mod users;

pub use activity::{ActivityService, CreateActivityRequest, UpdateActivityRequest};
pub use identity::{IdentityProviderVerifier, TokenVerifier, VerifiedClaims, VerifyError};
pub use photos::{PhotoError, PhotoStore, StoredPhoto};
pub use users::{Credentials, UserService};
