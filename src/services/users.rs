// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User accounts: signup, login and auto-provisioning from token claims.

use serde::Deserialize;
use validator::Validate;

use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::User;
use crate::services::identity::VerifiedClaims;
use crate::services::password::{hash_password, verify_password};

/// Body of `POST /api/auth/signup` and `POST /api/auth/login`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Credentials {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Emails are compared case-insensitively and without surrounding blanks.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Create an account with a password.
    ///
    /// Fails with [`AppError::Conflict`] if the email is taken.
    pub async fn signup(&self, credentials: Credentials) -> Result<User> {
        let credentials = Credentials {
            email: normalize_email(&credentials.email),
            password: credentials.password,
        };
        credentials.validate().map_err(|e| {
            AppError::BadRequest(crate::services::activity::first_validation_message(&e))
        })?;

        let hash = hash_password(&credentials.password)?;
        let user = self.db.create_user(&credentials.email, Some(&hash)).await?;

        tracing::info!(user_id = %user.id, "User signed up");
        Ok(user)
    }

    /// Check a password login.
    ///
    /// Unknown email, an account without a password (provisioned from an
    /// identity provider) and a wrong password all look the same.
    pub async fn login(&self, credentials: Credentials) -> Result<User> {
        let email = normalize_email(&credentials.email);

        let Some(user) = self.db.find_user_by_email(&email).await? else {
            tracing::debug!("Login for unknown email");
            return Err(AppError::InvalidCredentials);
        };
        let Some(hash) = user.password_hash.as_deref() else {
            tracing::debug!(user_id = %user.id, "Login for account without password");
            return Err(AppError::InvalidCredentials);
        };
        if !verify_password(&credentials.password, hash)? {
            tracing::debug!(user_id = %user.id, "Login with wrong password");
            return Err(AppError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(user)
    }

    /// Return the user with `email`, creating a password-less one if absent.
    ///
    /// Two concurrent callers for the same new email both end up with the
    /// same user: the loser of the insert race gets a conflict from the
    /// unique index and re-reads.
    pub async fn find_or_create_by_email(&self, email: &str) -> Result<User> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(AppError::InvalidToken);
        }

        if let Some(user) = self.db.find_user_by_email(&email).await? {
            return Ok(user);
        }

        match self.db.create_user(&email, None).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "Provisioned user from token claims");
                Ok(user)
            }
            Err(AppError::Conflict(_)) => self
                .db
                .find_user_by_email(&email)
                .await?
                .ok_or_else(|| {
                    AppError::Internal(anyhow::anyhow!(
                        "user vanished after unique-constraint conflict"
                    ))
                }),
            Err(e) => Err(e),
        }
    }

    /// Map verified token claims to the local user.
    pub async fn resolve_caller(&self, claims: &VerifiedClaims) -> Result<User> {
        let email = claims.email.as_deref().ok_or(AppError::InvalidToken)?;
        self.find_or_create_by_email(email).await
    }
}
