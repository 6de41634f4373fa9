// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Demo data for local development.

use crate::db::Db;
use crate::error::AppError;
use crate::models::NewActivity;
use crate::services::password::hash_password;

const DEMO_PASSWORD: &str = "password123";

/// Insert two demo users and three activities.
///
/// Users that already exist are reused, so running this twice only adds the
/// activities again.
pub async fn seed_demo_data(db: &Db) -> Result<usize, AppError> {
    let password_hash = hash_password(DEMO_PASSWORD)?;

    let mut owners = Vec::with_capacity(2);
    for email in ["user1@example.com", "user2@example.com"] {
        let user = match db.find_user_by_email(email).await? {
            Some(user) => user,
            None => db.create_user(email, Some(&password_hash)).await?,
        };
        owners.push(user.id);
    }

    let demo = [
        (owners[0], "Course", "2024-01-15", 30, 5.0),
        (owners[0], "Vélo", "2024-01-16", 60, 25.0),
        (owners[1], "Natation", "2024-01-17", 45, 2.0),
    ];

    for (owner_id, activity_type, date, duration, distance) in demo {
        db.insert_activity(NewActivity {
            activity_type: activity_type.to_string(),
            date: date.to_string(),
            duration,
            distance,
            photo: None,
            owner_id,
        })
        .await?;
    }

    tracing::info!(users = owners.len(), activities = demo.len(), "Seeded demo data");
    Ok(demo.len())
}
