// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Photo storage.
//!
//! Uploaded bytes are stored under a generated key and served back from
//! `/photos/{key}`. Keys look like `activities/{owner}/{millis}-{uuid}.{ext}`.

use std::path::{Path, PathBuf};

use dashmap::DashMap;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;

/// Accepted content types and the file extension stored for each.
const IMAGE_TYPES: [(&str, &str); 5] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("image/heic", "heic"),
];

#[derive(Debug, thiserror::Error)]
pub enum PhotoError {
    #[error("unsupported photo type: {0}")]
    UnsupportedType(String),

    #[error("photo is {size} bytes, limit is {max}")]
    TooLarge { size: usize, max: usize },

    #[error("photo is empty")]
    Empty,

    #[error("invalid photo key")]
    InvalidKey,

    #[error("photo storage I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PhotoError> for AppError {
    fn from(e: PhotoError) -> Self {
        match e {
            PhotoError::UnsupportedType(_) => AppError::UnsupportedMediaType(e.to_string()),
            PhotoError::TooLarge { .. } => AppError::PayloadTooLarge(e.to_string()),
            PhotoError::Empty => AppError::BadRequest(e.to_string()),
            PhotoError::InvalidKey => AppError::NotFound("Photo not found".to_string()),
            PhotoError::Io(e) => AppError::Internal(e.into()),
        }
    }
}

/// Where a stored photo can be found.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoredPhoto {
    pub key: String,
    pub url: String,
}

/// Bytes and content type of a stored photo.
#[derive(Debug, Clone)]
pub struct Photo {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

enum Backend {
    Directory(PathBuf),
    Memory(DashMap<String, Vec<u8>>),
}

pub struct PhotoStore {
    backend: Backend,
    public_base_url: String,
    max_bytes: usize,
}

impl PhotoStore {
    /// Directory-backed store if `PHOTO_STORAGE_DIR` is set, memory otherwise.
    pub fn from_config(config: &Config) -> Self {
        let backend = match &config.photo_storage_dir {
            Some(dir) => {
                tracing::info!(dir = %dir.display(), "Storing photos on disk");
                Backend::Directory(dir.clone())
            }
            None => {
                tracing::warn!("PHOTO_STORAGE_DIR not set, photos are kept in memory");
                Backend::Memory(DashMap::new())
            }
        };

        Self {
            backend,
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            max_bytes: config.max_photo_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Store `bytes` for `owner_id` and return its key and public URL.
    pub async fn put(
        &self,
        owner_id: Uuid,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredPhoto, PhotoError> {
        let extension = extension_for(content_type)?;
        if bytes.is_empty() {
            return Err(PhotoError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(PhotoError::TooLarge {
                size: bytes.len(),
                max: self.max_bytes,
            });
        }

        let key = format!(
            "activities/{}/{}-{}.{}",
            owner_id,
            chrono::Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            extension
        );

        let size = bytes.len();
        match &self.backend {
            Backend::Directory(dir) => {
                let path = dir.join(&key);
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&path, bytes).await?;
            }
            Backend::Memory(photos) => {
                photos.insert(key.clone(), bytes);
            }
        }

        tracing::info!(key = %key, size, "Stored photo");

        Ok(StoredPhoto {
            url: format!("{}/photos/{}", self.public_base_url, key),
            key,
        })
    }

    /// Fetch a stored photo. `Ok(None)` if there is nothing under `key`.
    pub async fn get(&self, key: &str) -> Result<Option<Photo>, PhotoError> {
        validate_key(key)?;
        let content_type = content_type_for(key).ok_or(PhotoError::InvalidKey)?;

        let bytes = match &self.backend {
            Backend::Directory(dir) => match tokio::fs::read(dir.join(key)).await {
                Ok(bytes) => Some(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(e.into()),
            },
            Backend::Memory(photos) => photos.get(key).map(|b| b.clone()),
        };

        Ok(bytes.map(|bytes| Photo {
            content_type,
            bytes,
        }))
    }
}

fn extension_for(content_type: &str) -> Result<&'static str, PhotoError> {
    // Ignore parameters such as "; charset=binary".
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    IMAGE_TYPES
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
        .ok_or(PhotoError::UnsupportedType(essence))
}

fn content_type_for(key: &str) -> Option<&'static str> {
    let ext = Path::new(key).extension()?.to_str()?;
    IMAGE_TYPES
        .iter()
        .find(|(_, e)| *e == ext)
        .map(|(mime, _)| *mime)
}

/// Keys are only ever ones we generated: relative, no `..`, plain characters.
fn validate_key(key: &str) -> Result<(), PhotoError> {
    let plain = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));

    if key.is_empty()
        || !plain
        || key.starts_with('/')
        || key.split('/').any(|part| part.is_empty() || part == "." || part == "..")
    {
        return Err(PhotoError::InvalidKey);
    }
    Ok(())
}
