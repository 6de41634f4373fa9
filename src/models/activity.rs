// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

/// Activity labels offered by the client forms. The stored type is free text.
pub const KNOWN_ACTIVITY_TYPES: [&str; 5] = ["Course", "Marche", "Vélo", "Natation", "Gym"];

/// Stored activity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Activity {
    pub id: Uuid,
    /// Sport label (Course, Vélo, ...)
    #[serde(rename = "type")]
    pub activity_type: String,
    /// Calendar date as entered by the user (YYYY-MM-DD)
    pub date: String,
    /// Duration in minutes
    pub duration: i32,
    /// Distance in kilometers
    pub distance: f64,
    /// Photo URL or data URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    /// Owning user
    pub owner_id: Uuid,
    /// Server-assigned creation time, drives list ordering
    pub created_at: DateTime<Utc>,
}

/// Validated fields for a new activity, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub activity_type: String,
    pub date: String,
    pub duration: i32,
    pub distance: f64,
    pub photo: Option<String>,
    pub owner_id: Uuid,
}

/// Validated partial update. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityPatch {
    pub activity_type: Option<String>,
    pub date: Option<String>,
    pub duration: Option<i32>,
    pub distance: Option<f64>,
    pub photo: Option<String>,
}

impl ActivityPatch {
    pub fn is_empty(&self) -> bool {
        self.activity_type.is_none()
            && self.date.is_none()
            && self.duration.is_none()
            && self.distance.is_none()
            && self.photo.is_none()
    }

    /// Apply the patch to an in-memory record.
    pub fn apply_to(&self, activity: &mut Activity) {
        if let Some(activity_type) = &self.activity_type {
            activity.activity_type = activity_type.clone();
        }
        if let Some(date) = &self.date {
            activity.date = date.clone();
        }
        if let Some(duration) = self.duration {
            activity.duration = duration;
        }
        if let Some(distance) = self.distance {
            activity.distance = distance;
        }
        if let Some(photo) = &self.photo {
            activity.photo = Some(photo.clone());
        }
    }
}

impl Activity {
    /// Build the stored form of a new activity.
    pub fn from_new(new: NewActivity, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            activity_type: new.activity_type,
            date: new.date,
            duration: new.duration,
            distance: new.distance,
            photo: new.photo,
            owner_id: new.owner_id,
            created_at,
        }
    }
}
