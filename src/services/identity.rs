// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer token verification.
//!
//! Two kinds of token are accepted:
//! - session tokens issued by this server at signup/login (HS256, no `kid`)
//! - ID tokens from a hosted identity provider (RS256 with a `kid`), checked
//!   against the provider's published JWKS

use crate::config::{Config, IdentityProviderConfig};
use crate::middleware::auth::Claims;
use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
/// Minimum spacing between JWKS refetches triggered by an unknown `kid`.
const FORCED_REFRESH_INTERVAL: Duration = Duration::from_secs(12);
const CLOCK_SKEW_SECS: u64 = 60;

/// Identity extracted from a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    pub subject: String,
    pub email: Option<String>,
}

/// Token verification failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VerifyError {
    /// Malformed, expired, wrongly signed, or with unexpected claims.
    #[error("invalid token: {0}")]
    Invalid(String),
    /// The identity provider's keys could not be fetched.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Verifies every bearer token the API accepts.
pub struct TokenVerifier {
    session_key: DecodingKey,
    identity_provider: Option<IdentityProviderVerifier>,
}

impl TokenVerifier {
    /// Session tokens always; identity-provider tokens if one is configured.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let identity_provider = config
            .identity_provider
            .as_ref()
            .map(IdentityProviderVerifier::new)
            .transpose()?;

        Ok(Self::with_identity_provider(config, identity_provider))
    }

    pub fn with_identity_provider(
        config: &Config,
        identity_provider: Option<IdentityProviderVerifier>,
    ) -> Self {
        Self {
            session_key: DecodingKey::from_secret(&config.jwt_signing_key),
            identity_provider,
        }
    }

    pub async fn verify(&self, token: &str) -> Result<VerifiedClaims, VerifyError> {
        let header = decode_header(token)
            .map_err(|e| VerifyError::Invalid(format!("invalid JWT header: {e}")))?;

        match header.kid {
            None => self.verify_session_token(token),
            Some(kid) => match &self.identity_provider {
                Some(idp) => idp.verify(token, header.alg, &kid).await,
                None => Err(VerifyError::Invalid(
                    "identity provider tokens are not accepted".to_string(),
                )),
            },
        }
    }

    fn verify_session_token(&self, token: &str) -> Result<VerifiedClaims, VerifyError> {
        let validation = Validation::new(Algorithm::HS256);

        let token_data = decode::<Claims>(token, &self.session_key, &validation)
            .map_err(|e| VerifyError::Invalid(format!("session token: {e}")))?;

        Ok(VerifiedClaims {
            subject: token_data.claims.sub,
            email: Some(token_data.claims.email),
        })
    }
}

#[derive(Clone)]
enum VerifierMode {
    /// Keys fetched from the provider's JWKS endpoint.
    Remote { jwks_url: String },
    /// One fixed key, for deterministic tests.
    StaticKey {
        kid: String,
        algorithm: Algorithm,
        decoding_key: Arc<DecodingKey>,
    },
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for hosted identity provider ID tokens.
pub struct IdentityProviderVerifier {
    http_client: reqwest::Client,
    issuer: String,
    audience: String,
    mode: VerifierMode,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
    last_forced_refresh: Mutex<Option<Instant>>,
}

impl IdentityProviderVerifier {
    /// Production verifier that fetches and caches the provider's JWKS.
    pub fn new(config: &IdentityProviderConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building JWKS HTTP client")?;

        tracing::info!(
            issuer = %config.issuer,
            audience = %config.audience,
            jwks_url = %config.jwks_url,
            "Initialized identity provider verifier"
        );

        Ok(Self::build(
            http_client,
            config,
            VerifierMode::Remote {
                jwks_url: config.jwks_url.clone(),
            },
        ))
    }

    /// Verifier with one fixed key and algorithm.
    pub fn new_with_static_key(
        config: &IdentityProviderConfig,
        kid: impl Into<String>,
        algorithm: Algorithm,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static identity provider kid must not be empty");
        }

        Ok(Self::build(
            reqwest::Client::new(),
            config,
            VerifierMode::StaticKey {
                kid,
                algorithm,
                decoding_key: Arc::new(decoding_key),
            },
        ))
    }

    fn build(http_client: reqwest::Client, config: &IdentityProviderConfig, mode: VerifierMode) -> Self {
        Self {
            http_client,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            mode,
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            last_forced_refresh: Mutex::new(None),
        }
    }

    async fn verify(
        &self,
        token: &str,
        alg: Algorithm,
        kid: &str,
    ) -> Result<VerifiedClaims, VerifyError> {
        let expected_alg = match &self.mode {
            VerifierMode::Remote { .. } => Algorithm::RS256,
            VerifierMode::StaticKey { algorithm, .. } => *algorithm,
        };
        if alg != expected_alg {
            return Err(VerifyError::Invalid(format!("unexpected JWT alg: {alg:?}")));
        }

        let decoding_key = self.decoding_key_for_kid(kid).await?;

        let mut validation = Validation::new(expected_alg);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        validation.validate_nbf = true;
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<IdTokenClaims>(token, decoding_key.as_ref(), &validation)
            .map_err(|e| VerifyError::Invalid(format!("JWT validation failed: {e}")))?
            .claims;

        tracing::debug!(
            subject = %claims.sub,
            email_verified = ?claims.email_verified,
            "Identity provider token claims"
        );

        if claims.email_verified == Some(false) {
            return Err(VerifyError::Invalid(
                "email_verified claim is false".to_string(),
            ));
        }

        Ok(VerifiedClaims {
            subject: claims.sub,
            email: claims.email,
        })
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, VerifyError> {
        let jwks_url = match &self.mode {
            VerifierMode::StaticKey {
                kid: static_kid,
                decoding_key,
                ..
            } => {
                if kid == static_kid {
                    return Ok(decoding_key.clone());
                }

                return Err(VerifyError::Invalid(format!(
                    "unknown JWT kid for static verifier: {kid}"
                )));
            }
            VerifierMode::Remote { jwks_url } => jwks_url,
        };

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        self.refresh_jwks(jwks_url, false).await?;
        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        // Possibly a key rotation, but an attacker can mint arbitrary kids.
        if self.claim_forced_refresh().await {
            self.refresh_jwks(jwks_url, true).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(VerifyError::Invalid(format!(
            "JWT kid not found in JWKS: {kid}"
        )))
    }

    async fn claim_forced_refresh(&self) -> bool {
        let mut last = self.last_forced_refresh.lock().await;
        let now = Instant::now();
        if last.is_some_and(|at| now.duration_since(at) < FORCED_REFRESH_INTERVAL) {
            return false;
        }
        *last = Some(now);
        true
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, jwks_url: &str, force_refresh: bool) -> Result<(), VerifyError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        tracing::debug!(jwks_url = %jwks_url, force_refresh, "Refreshing JWKS cache");

        let response = self
            .http_client
            .get(jwks_url)
            .send()
            .await
            .map_err(|e| VerifyError::Unavailable(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(VerifyError::Unavailable(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| VerifyError::Unavailable(format!("invalid JWKS JSON: {e}")))?;

        let keys_by_kid = usable_keys(jwks);
        if keys_by_kid.is_empty() {
            return Err(VerifyError::Unavailable(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        let key_count = keys_by_kid.len();
        *self.jwks_cache.write().await = Some(JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        });

        tracing::debug!(ttl_secs = ttl.as_secs(), key_count, "JWKS cache refreshed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

/// `aud` is checked by `jsonwebtoken` and may be a string or an array, so
/// it is not deserialized here.
#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
}

/// RSA signing keys from a JWKS, by `kid`.
fn usable_keys(jwks: Jwks) -> HashMap<String, Arc<DecodingKey>> {
    let mut keys_by_kid = HashMap::new();

    for jwk in jwks.keys {
        if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
            continue;
        }
        if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
            continue;
        }
        if jwk.use_.as_deref().is_some_and(|use_| use_ != "sig") {
            continue;
        }

        match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
            Ok(key) => {
                keys_by_kid.insert(jwk.kid, Arc::new(key));
            }
            Err(e) => {
                tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
            }
        }
    }

    keys_by_kid
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    value.split(',').find_map(|directive| {
        directive
            .trim()
            .strip_prefix("max-age=")
            .and_then(|raw| raw.trim_matches('"').parse::<u64>().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::auth::create_jwt;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use uuid::Uuid;

    const IDP_SECRET: &[u8] = b"identity-provider-test-secret!!!";

    fn idp_config() -> IdentityProviderConfig {
        IdentityProviderConfig {
            issuer: "https://idp.example.com/pool".to_string(),
            audience: "fittrack-web".to_string(),
            jwks_url: "http://127.0.0.1:9/jwks.json".to_string(),
        }
    }

    fn static_verifier(config: &Config) -> TokenVerifier {
        let idp = IdentityProviderVerifier::new_with_static_key(
            &idp_config(),
            "test-kid",
            Algorithm::HS256,
            DecodingKey::from_secret(IDP_SECRET),
        )
        .unwrap();
        TokenVerifier::with_identity_provider(config, Some(idp))
    }

    fn idp_token(kid: &str, claims: serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(kid.to_string());
        encode(&header, &claims, &EncodingKey::from_secret(IDP_SECRET)).unwrap()
    }

    fn now() -> u64 {
        chrono::Utc::now().timestamp() as u64
    }

    #[test]
    fn parse_cache_control_max_age_valid() {
        assert_eq!(
            parse_cache_control_max_age("public, max-age=3600"),
            Some(3600)
        );
        assert_eq!(parse_cache_control_max_age("max-age=60"), Some(60));
        assert_eq!(parse_cache_control_max_age("max-age=\"120\""), Some(120));
    }

    #[test]
    fn parse_cache_control_max_age_invalid() {
        assert_eq!(parse_cache_control_max_age("public, immutable"), None);
        assert_eq!(parse_cache_control_max_age("max-age=abc"), None);
        assert_eq!(parse_cache_control_max_age(""), None);
    }

    #[test]
    fn usable_keys_filters_non_signing_keys() {
        let jwks: Jwks = serde_json::from_value(json!({
            "keys": [
                {"kid": "enc", "kty": "RSA", "use": "enc", "n": "AQAB", "e": "AQAB"},
                {"kid": "ec", "kty": "EC", "n": "AQAB", "e": "AQAB"},
                {"kid": "ps", "kty": "RSA", "alg": "PS256", "n": "AQAB", "e": "AQAB"},
                {"kid": "", "kty": "RSA", "n": "AQAB", "e": "AQAB"},
                {"kid": "good", "kty": "RSA", "alg": "RS256", "use": "sig", "n": "AQAB", "e": "AQAB"}
            ]
        }))
        .unwrap();

        let keys = usable_keys(jwks);
        assert_eq!(keys.keys().collect::<Vec<_>>(), vec!["good"]);
    }

    #[tokio::test]
    async fn session_token_round_trip() {
        let config = Config::test_default();
        let verifier = TokenVerifier::new(&config).unwrap();
        let user_id = Uuid::new_v4();

        let token = create_jwt(user_id, "u1@example.com", &config.jwt_signing_key).unwrap();
        let claims = verifier.verify(&token).await.unwrap();

        assert_eq!(claims.subject, user_id.to_string());
        assert_eq!(claims.email.as_deref(), Some("u1@example.com"));
    }

    #[tokio::test]
    async fn session_token_with_wrong_key_is_rejected() {
        let config = Config::test_default();
        let verifier = TokenVerifier::new(&config).unwrap();

        let token = create_jwt(Uuid::new_v4(), "u1@example.com", b"some-other-key").unwrap();
        assert!(matches!(
            verifier.verify(&token).await,
            Err(VerifyError::Invalid(_))
        ));
        assert!(matches!(
            verifier.verify("not-a-jwt").await,
            Err(VerifyError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn identity_provider_token_without_provider_is_rejected() {
        let verifier = TokenVerifier::new(&Config::test_default()).unwrap();
        let token = idp_token(
            "test-kid",
            json!({"sub": "abc", "iss": idp_config().issuer, "aud": "fittrack-web", "exp": now() + 300}),
        );
        assert!(matches!(
            verifier.verify(&token).await,
            Err(VerifyError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn static_identity_provider_checks_claims() {
        let verifier = static_verifier(&Config::test_default());
        let issuer = idp_config().issuer;

        let good = idp_token(
            "test-kid",
            json!({
                "sub": "idp-user-1",
                "email": "sso@example.com",
                "email_verified": true,
                "iss": issuer,
                "aud": "fittrack-web",
                "exp": now() + 300
            }),
        );
        let claims = verifier.verify(&good).await.unwrap();
        assert_eq!(claims.subject, "idp-user-1");
        assert_eq!(claims.email.as_deref(), Some("sso@example.com"));

        let bad_cases = [
            idp_token(
                "test-kid",
                json!({"sub": "x", "iss": "https://evil.example.com", "aud": "fittrack-web", "exp": now() + 300}),
            ),
            idp_token(
                "test-kid",
                json!({"sub": "x", "iss": issuer, "aud": "someone-else", "exp": now() + 300}),
            ),
            idp_token(
                "test-kid",
                json!({"sub": "x", "iss": issuer, "aud": "fittrack-web", "exp": now() - 3600}),
            ),
            idp_token(
                "other-kid",
                json!({"sub": "x", "iss": issuer, "aud": "fittrack-web", "exp": now() + 300}),
            ),
            idp_token(
                "test-kid",
                json!({
                    "sub": "x",
                    "email": "x@example.com",
                    "email_verified": false,
                    "iss": issuer,
                    "aud": "fittrack-web",
                    "exp": now() + 300
                }),
            ),
        ];

        for token in bad_cases {
            assert!(matches!(
                verifier.verify(&token).await,
                Err(VerifyError::Invalid(_))
            ));
        }
    }

    #[tokio::test]
    async fn forced_refresh_is_rate_limited() {
        let verifier = IdentityProviderVerifier::new(&idp_config()).unwrap();
        assert!(verifier.claim_forced_refresh().await);
        assert!(!verifier.claim_forced_refresh().await);
    }

    #[tokio::test]
    async fn unreachable_jwks_is_unavailable() {
        let verifier = IdentityProviderVerifier::new(&idp_config()).unwrap();
        let result = verifier.decoding_key_for_kid("any").await;
        assert!(matches!(result, Err(VerifyError::Unavailable(_))));
    }
}
