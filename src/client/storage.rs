// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local session persistence.
//!
//! A small string key/value file. Two keys are used: [`DATA_KEY`] caches the
//! user and their activities as JSON, [`TOKEN_KEY`] holds the session token.
//! Nothing here is authoritative, so every failure is logged and ignored.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::{Activity, PublicUser};

pub const DATA_KEY: &str = "fittrack:data:v1";
pub const TOKEN_KEY: &str = "token";

/// Cached view state written under [`DATA_KEY`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredData {
    pub user: Option<PublicUser>,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("session file I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("session file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

enum Backend {
    File(PathBuf),
    Memory(BTreeMap<String, String>),
}

pub struct SessionStorage {
    backend: Backend,
}

impl SessionStorage {
    /// Storage backed by a JSON file, created on first write.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::File(path.into()),
        }
    }

    /// Storage that lives as long as this value.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(BTreeMap::new()),
        }
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        match self.read_all() {
            Ok(mut items) => items.remove(key),
            Err(e) => {
                tracing::warn!(error = %e, key, "Failed to read session storage");
                None
            }
        }
    }

    pub fn set_item(&mut self, key: &str, value: String) {
        if let Err(e) = self.update(|items| {
            items.insert(key.to_string(), value);
        }) {
            tracing::warn!(error = %e, key, "Failed to write session storage");
        }
    }

    pub fn remove_item(&mut self, key: &str) {
        if let Err(e) = self.update(|items| {
            items.remove(key);
        }) {
            tracing::warn!(error = %e, key, "Failed to write session storage");
        }
    }

    pub fn load_data(&self) -> Option<StoredData> {
        let raw = self.get_item(DATA_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unreadable cached data");
                None
            }
        }
    }

    pub fn save_data(&mut self, data: &StoredData) {
        match serde_json::to_string(data) {
            Ok(raw) => self.set_item(DATA_KEY, raw),
            Err(e) => tracing::warn!(error = %e, "Failed to encode cached data"),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.get_item(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    pub fn set_token(&mut self, token: &str) {
        self.set_item(TOKEN_KEY, token.to_string());
    }

    pub fn clear_token(&mut self) {
        self.remove_item(TOKEN_KEY);
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match &self.backend {
            Backend::Memory(items) => Ok(items.clone()),
            Backend::File(path) => read_file(path),
        }
    }

    fn update(&mut self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), StorageError> {
        match &mut self.backend {
            Backend::Memory(items) => {
                f(items);
                Ok(())
            }
            Backend::File(path) => {
                // A corrupt file is replaced rather than blocking every write.
                let mut items = read_file(path).unwrap_or_else(|e| {
                    tracing::warn!(error = %e, path = %path.display(), "Discarding session file");
                    BTreeMap::new()
                });
                f(&mut items);
                write_file(path, &items)
            }
        }
    }
}

fn read_file(path: &Path) -> Result<BTreeMap<String, String>, StorageError> {
    match std::fs::read_to_string(path) {
        Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e.into()),
    }
}

fn write_file(path: &Path, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(items)?)?;
    Ok(())
}
