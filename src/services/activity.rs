// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity service.
//!
//! Handles the activity workflow on top of [`Db`]:
//! 1. Validate and normalize the incoming fields
//! 2. Persist with server-assigned id and creation time
//! 3. Guard mutations with a single conditional statement keyed on owner

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::db::Db;
use crate::error::{AppError, Result};
use crate::models::{Activity, ActivityPatch, NewActivity};

/// A number as sent by a form: either a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberInput {
    Number(f64),
    Text(String),
}

impl NumberInput {
    /// `None` for an empty string, `Some(Err)` for anything non-numeric.
    fn parse(&self) -> Option<std::result::Result<f64, ()>> {
        match self {
            NumberInput::Number(n) => Some(Ok(*n)),
            NumberInput::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    None
                } else {
                    Some(s.parse::<f64>().map_err(|_| ()))
                }
            }
        }
    }
}

impl From<f64> for NumberInput {
    fn from(n: f64) -> Self {
        NumberInput::Number(n)
    }
}

/// Body of `POST /api/activities`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateActivityRequest {
    #[serde(rename = "type", default)]
    #[validate(
        required(message = "Type is required"),
        length(min = 1, message = "Type is required")
    )]
    pub activity_type: Option<String>,

    #[serde(default)]
    #[validate(
        required(message = "Date is required"),
        length(min = 1, message = "Date is required")
    )]
    pub date: Option<String>,

    #[serde(default)]
    #[validate(required(message = "Duration is required"))]
    pub duration: Option<NumberInput>,

    #[serde(default)]
    pub distance: Option<NumberInput>,

    #[serde(default)]
    pub photo: Option<String>,

    /// Older clients send the photo under this name.
    #[serde(rename = "photoUrl", default)]
    pub photo_url: Option<String>,
}

/// Body of `PUT /api/activities/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateActivityRequest {
    #[serde(rename = "type", default)]
    #[validate(length(min = 1, message = "Type must not be empty"))]
    pub activity_type: Option<String>,

    #[serde(default)]
    #[validate(length(min = 1, message = "Date must not be empty"))]
    pub date: Option<String>,

    #[serde(default)]
    pub duration: Option<NumberInput>,

    #[serde(default)]
    pub distance: Option<NumberInput>,

    #[serde(default)]
    pub photo: Option<String>,

    #[serde(rename = "photoUrl", default)]
    pub photo_url: Option<String>,
}

/// Field order for reporting the first validation failure.
const FIELD_ORDER: [&str; 4] = ["type", "activity_type", "date", "duration"];

/// Pick one message out of a set of validation errors, preferring fields in
/// form order so the same input always yields the same message.
pub(crate) fn first_validation_message(errors: &validator::ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by_key(|(name, _)| {
        FIELD_ORDER
            .iter()
            .position(|f| *f == name.as_ref())
            .unwrap_or(FIELD_ORDER.len())
    });

    fields
        .into_iter()
        .flat_map(|(_, errs)| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid request".to_string())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_duration(input: &NumberInput) -> Result<i32> {
    let minutes = match input.parse() {
        None => return Err(AppError::BadRequest("Duration is required".to_string())),
        Some(Err(())) => {
            return Err(AppError::BadRequest("Duration must be a number".to_string()))
        }
        Some(Ok(n)) => n,
    };

    if !minutes.is_finite() || minutes.fract() != 0.0 {
        return Err(AppError::BadRequest(
            "Duration must be a whole number of minutes".to_string(),
        ));
    }
    if minutes < f64::from(i32::MIN) || minutes > f64::from(i32::MAX) {
        return Err(AppError::BadRequest("Duration is out of range".to_string()));
    }

    Ok(minutes as i32)
}

/// Missing, empty and zero all mean 0 km.
fn parse_distance(input: Option<&NumberInput>) -> Result<f64> {
    match input.and_then(NumberInput::parse) {
        None => Ok(0.0),
        Some(Ok(km)) if km.is_finite() => Ok(km),
        Some(_) => Err(AppError::BadRequest("Distance must be a number".to_string())),
    }
}

impl CreateActivityRequest {
    /// Validate and turn into a record for `owner_id`.
    pub fn into_new_activity(self, owner_id: Uuid) -> Result<NewActivity> {
        self.validate()
            .map_err(|e| AppError::BadRequest(first_validation_message(&e)))?;

        let activity_type = trimmed(self.activity_type)
            .ok_or_else(|| AppError::BadRequest("Type is required".to_string()))?;
        let date = trimmed(self.date)
            .ok_or_else(|| AppError::BadRequest("Date is required".to_string()))?;
        let duration = match &self.duration {
            Some(d) => parse_duration(d)?,
            None => return Err(AppError::BadRequest("Duration is required".to_string())),
        };
        let distance = parse_distance(self.distance.as_ref())?;

        Ok(NewActivity {
            activity_type,
            date,
            duration,
            distance,
            photo: trimmed(self.photo).or_else(|| trimmed(self.photo_url)),
            owner_id,
        })
    }
}

impl UpdateActivityRequest {
    pub fn into_patch(self) -> Result<ActivityPatch> {
        self.validate()
            .map_err(|e| AppError::BadRequest(first_validation_message(&e)))?;

        let activity_type = match self.activity_type {
            Some(t) => Some(
                trimmed(Some(t))
                    .ok_or_else(|| AppError::BadRequest("Type must not be empty".to_string()))?,
            ),
            None => None,
        };
        let date = match self.date {
            Some(d) => Some(
                trimmed(Some(d))
                    .ok_or_else(|| AppError::BadRequest("Date must not be empty".to_string()))?,
            ),
            None => None,
        };
        let duration = self.duration.as_ref().map(parse_duration).transpose()?;
        let distance = match &self.distance {
            Some(d) => Some(parse_distance(Some(d))?),
            None => None,
        };

        Ok(ActivityPatch {
            activity_type,
            date,
            duration,
            distance,
            photo: trimmed(self.photo).or_else(|| trimmed(self.photo_url)),
        })
    }
}

/// Business rules for activities.
#[derive(Clone)]
pub struct ActivityService {
    db: Db,
}

impl ActivityService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Validate `request` and store it for `owner_id`.
    ///
    /// Nothing is written if validation fails.
    pub async fn create_activity(
        &self,
        request: CreateActivityRequest,
        owner_id: Uuid,
    ) -> Result<Activity> {
        let new = request.into_new_activity(owner_id)?;
        let activity = self.db.insert_activity(new).await?;

        tracing::info!(
            activity_id = %activity.id,
            owner_id = %owner_id,
            activity_type = %activity.activity_type,
            "Created activity"
        );

        Ok(activity)
    }

    pub async fn get_activity_by_id(&self, id: Uuid) -> Result<Option<Activity>> {
        self.db.get_activity(id).await
    }

    /// Activities of one owner, newest first.
    pub async fn get_activities_by_user(&self, owner_id: Uuid) -> Result<Vec<Activity>> {
        self.db.list_activities_for_owner(owner_id).await
    }

    /// Every activity, newest first.
    pub async fn get_all_activities(&self) -> Result<Vec<Activity>> {
        self.db.list_all_activities().await
    }

    /// Delete without an ownership check. `false` if there was nothing to
    /// delete, which callers treat as a plain not-found.
    pub async fn delete_activity(&self, id: Uuid) -> Result<bool> {
        Ok(self.db.delete_activity(id).await? > 0)
    }

    /// Delete `id` only if `owner_id` owns it.
    ///
    /// A missing record and someone else's record both yield
    /// [`AppError::Forbidden`].
    pub async fn delete_owned_activity(&self, id: Uuid, owner_id: Uuid) -> Result<()> {
        let removed = self.db.delete_activity_owned(id, owner_id).await?;
        if removed == 0 {
            tracing::warn!(activity_id = %id, caller = %owner_id, "Refused activity delete");
            return Err(AppError::Forbidden);
        }

        tracing::info!(activity_id = %id, owner_id = %owner_id, "Deleted activity");
        Ok(())
    }

    /// Apply `request` to `id` only if `owner_id` owns it.
    pub async fn update_owned_activity(
        &self,
        id: Uuid,
        owner_id: Uuid,
        request: UpdateActivityRequest,
    ) -> Result<Activity> {
        let patch = request.into_patch()?;

        let updated = if patch.is_empty() {
            // Nothing to change, but the caller still has to own the record.
            self.db
                .get_activity(id)
                .await?
                .filter(|a| a.owner_id == owner_id)
        } else {
            self.db.update_activity_owned(id, owner_id, &patch).await?
        };

        match updated {
            Some(activity) => {
                tracing::info!(activity_id = %id, owner_id = %owner_id, "Updated activity");
                Ok(activity)
            }
            None => {
                tracing::warn!(activity_id = %id, caller = %owner_id, "Refused activity update");
                Err(AppError::Forbidden)
            }
        }
    }
}
