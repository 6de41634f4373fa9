//! Application configuration loaded from environment variables.
//!
//! Everything optional degrades to a local-development default: no
//! `DATABASE_URL` means the in-memory store, no `PHOTO_STORAGE_DIR` means
//! photos are kept in memory, no `IDP_ISSUER` means only locally issued
//! session tokens are accepted.

use std::env;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const DEFAULT_MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Frontend URL (allowed CORS origin)
    pub frontend_url: String,
    /// Extra allowed CORS origin for the CDN-hosted frontend
    pub cloudfront_domain: Option<String>,
    /// Public base URL of this API, used to build photo URLs
    pub public_base_url: String,
    /// PostgreSQL connection string; `None` selects the in-memory store
    pub database_url: Option<String>,
    /// HS256 key for locally issued session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Hosted identity provider, if bearer tokens from it are accepted
    pub identity_provider: Option<IdentityProviderConfig>,
    /// Whether `GET /api/activities` is open to anonymous callers
    pub public_activity_feed: bool,
    /// Directory for uploaded photos; `None` keeps them in memory
    pub photo_storage_dir: Option<PathBuf>,
    /// Upper bound for a single uploaded photo
    pub max_photo_bytes: usize,
    /// Insert the demo users and activities at startup
    pub seed_demo_data: bool,
}

/// Hosted identity provider whose RS256 tokens are verified against its JWKS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProviderConfig {
    /// Expected `iss` claim
    pub issuer: String,
    /// Expected `aud` claim (the provider's client id for this app)
    pub audience: String,
    /// Where the provider publishes its signing keys
    pub jwks_url: String,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            cloudfront_domain: None,
            public_base_url: format!("http://localhost:{}", DEFAULT_PORT),
            database_url: None,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            identity_provider: None,
            public_activity_feed: true,
            photo_storage_dir: None,
            max_photo_bytes: DEFAULT_MAX_PHOTO_BYTES,
            seed_demo_data: false,
        }
    }
}

impl Config {
    /// Config used by unit and integration tests.
    pub fn test_default() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT", raw))?,
            Err(_) => DEFAULT_PORT,
        };

        let max_photo_bytes = match env::var("MAX_PHOTO_BYTES") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Invalid("MAX_PHOTO_BYTES", raw))?,
            Err(_) => DEFAULT_MAX_PHOTO_BYTES,
        };

        Ok(Self {
            port,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| DEFAULT_FRONTEND_URL.to_string()),
            cloudfront_domain: non_empty_var("CLOUDFRONT_DOMAIN"),
            public_base_url: non_empty_var("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://localhost:{}", port)),
            database_url: non_empty_var("DATABASE_URL"),
            jwt_signing_key: env::var("JWT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("JWT_SECRET"))?
                .into_bytes(),
            identity_provider: identity_provider_from_env()?,
            public_activity_feed: bool_var("PUBLIC_ACTIVITY_FEED", true)?,
            photo_storage_dir: non_empty_var("PHOTO_STORAGE_DIR").map(PathBuf::from),
            max_photo_bytes,
            seed_demo_data: bool_var("SEED_DEMO_DATA", false)?,
        })
    }
}

fn identity_provider_from_env() -> Result<Option<IdentityProviderConfig>, ConfigError> {
    let Some(issuer) = non_empty_var("IDP_ISSUER") else {
        return Ok(None);
    };
    let issuer = issuer.trim_end_matches('/').to_string();

    let audience = non_empty_var("IDP_AUDIENCE").ok_or(ConfigError::Missing("IDP_AUDIENCE"))?;
    let jwks_url = non_empty_var("IDP_JWKS_URL")
        .unwrap_or_else(|| format!("{}/.well-known/jwks.json", issuer));

    Ok(Some(IdentityProviderConfig {
        issuer,
        audience,
        jwks_url,
    }))
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn bool_var(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match non_empty_var(name) {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid(name, raw)),
        },
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
