// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory backend.
//!
//! Mirrors the PostgreSQL schema closely enough that the service layer cannot
//! tell the two apart: email is unique (checked and claimed through one
//! `DashMap` entry), conditional deletes use `remove_if`, and listings are
//! ordered by creation time with an insertion sequence as tiebreaker.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Activity, ActivityPatch, NewActivity, User};

#[derive(Debug, Clone)]
struct StoredActivity {
    seq: u64,
    activity: Activity,
}

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<Uuid, User>,
    /// Unique index on `users.email`
    user_ids_by_email: DashMap<String, Uuid>,
    activities: DashMap<Uuid, StoredActivity>,
    next_seq: AtomicU64,
}

impl MemoryStore {
    pub fn create_user(&self, email: &str, password_hash: Option<&str>) -> Result<User, AppError> {
        match self.user_ids_by_email.entry(email.to_string()) {
            Entry::Occupied(_) => Err(AppError::Conflict("User already exists".to_string())),
            Entry::Vacant(slot) => {
                let user = User {
                    id: Uuid::new_v4(),
                    email: email.to_string(),
                    password_hash: password_hash.map(str::to_string),
                    created_at: Utc::now(),
                };
                self.users.insert(user.id, user.clone());
                slot.insert(user.id);
                Ok(user)
            }
        }
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<User> {
        let id = *self.user_ids_by_email.get(email)?;
        self.get_user(id)
    }

    pub fn get_user(&self, id: Uuid) -> Option<User> {
        self.users.get(&id).map(|u| u.clone())
    }

    pub fn list_users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|u| u.clone()).collect();
        users.sort_by_key(|u| u.created_at);
        users
    }

    pub fn delete_user(&self, id: Uuid) -> bool {
        let Some((_, user)) = self.users.remove(&id) else {
            return false;
        };
        self.user_ids_by_email.remove(&user.email);
        self.activities.retain(|_, stored| stored.activity.owner_id != id);
        true
    }

    /// The owner's entry stays read-locked until the activity is in, so a
    /// concurrent `delete_user` either runs first (and the insert fails) or
    /// waits and then sweeps the new activity with the rest.
    pub fn insert_activity(&self, new: NewActivity) -> Result<Activity, AppError> {
        let Some(_owner) = self.users.get(&new.owner_id) else {
            return Err(AppError::BadRequest(format!(
                "Owner {} does not exist",
                new.owner_id
            )));
        };

        let activity = Activity::from_new(new, Utc::now());
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.activities.insert(
            activity.id,
            StoredActivity {
                seq,
                activity: activity.clone(),
            },
        );
        Ok(activity)
    }

    pub fn get_activity(&self, id: Uuid) -> Option<Activity> {
        self.activities.get(&id).map(|s| s.activity.clone())
    }

    pub fn list_activities(&self, owner_id: Option<Uuid>) -> Vec<Activity> {
        let mut matching: Vec<StoredActivity> = self
            .activities
            .iter()
            .filter(|s| owner_id.is_none_or(|owner| s.activity.owner_id == owner))
            .map(|s| s.clone())
            .collect();

        matching.sort_by(|a, b| {
            b.activity
                .created_at
                .cmp(&a.activity.created_at)
                .then_with(|| b.seq.cmp(&a.seq))
        });

        matching.into_iter().map(|s| s.activity).collect()
    }

    pub fn delete_activity(&self, id: Uuid, owner_id: Option<Uuid>) -> u64 {
        let removed = self.activities.remove_if(&id, |_, stored| {
            owner_id.is_none_or(|owner| stored.activity.owner_id == owner)
        });
        u64::from(removed.is_some())
    }

    pub fn update_activity_owned(
        &self,
        id: Uuid,
        owner_id: Uuid,
        patch: &ActivityPatch,
    ) -> Option<Activity> {
        let mut stored = self.activities.get_mut(&id)?;
        if stored.activity.owner_id != owner_id {
            return None;
        }
        patch.apply_to(&mut stored.activity);
        Some(stored.activity.clone())
    }
}
