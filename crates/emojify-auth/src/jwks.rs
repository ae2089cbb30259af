//! Issuer JWKS fetching and caching.
//!
//! The gateway trusts exactly one issuer, so the cache holds a single key set.
//! Keys are fetched lazily on first use, kept for the configured TTL, and
//! refreshed once when a token references a `kid` the cached set does not
//! contain (key rotation).
//!
//! # Security Considerations
//!
//! - Only HTTPS URIs are allowed unless `allow_http` is set
//! - The HTTP client carries an explicit timeout so a slow issuer cannot
//!   stall request handling
//! - Response size is limited

use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::RwLock;
use url::Url;

use crate::config::AuthConfig;

const MAX_RESPONSE_SIZE: usize = 1024 * 1024;

/// Errors that can occur during JWKS operations.
#[derive(Debug, thiserror::Error)]
pub enum JwksError {
    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    ClientError(String),

    /// A network error occurred while fetching the JWKS.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The HTTP request returned a non-success status code.
    #[error("HTTP error: status {0}")]
    HttpError(u16),

    /// The JWKS response could not be parsed as JSON.
    #[error("Failed to parse JWKS: {0}")]
    ParseError(String),

    /// The requested key was not found in the JWKS.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// No signing keys were found in the JWKS.
    #[error("No signing keys found in JWKS")]
    NoSigningKeys,

    /// The key could not be converted to a decoding key.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The JWKS URI scheme is not allowed.
    #[error("Invalid URL scheme: only HTTPS is allowed")]
    InvalidScheme,

    /// The response exceeded the maximum allowed size.
    #[error("Response exceeds maximum size of {max_size} bytes")]
    ResponseTooLarge {
        /// The maximum allowed size.
        max_size: usize,
    },
}

struct CachedJwks {
    jwks: JwkSet,
    expires_at: Instant,
}

/// Cache for the issuer's signing keys.
pub struct JwksCache {
    http_client: reqwest::Client,
    jwks_uri: Url,
    ttl: Duration,
    allow_http: bool,
    cached: RwLock<Option<CachedJwks>>,
}

impl JwksCache {
    /// Creates a cache for the key set published by the configured issuer.
    pub fn from_config(config: &AuthConfig) -> Result<Self, JwksError> {
        let jwks_uri = config
            .jwks_url()
            .map_err(|e| JwksError::ClientError(e.to_string()))?;
        Self::new(
            jwks_uri,
            config.request_timeout(),
            config.jwks_ttl(),
            config.allow_http,
        )
    }

    pub fn new(
        jwks_uri: Url,
        request_timeout: Duration,
        ttl: Duration,
        allow_http: bool,
    ) -> Result<Self, JwksError> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| JwksError::ClientError(e.to_string()))?;

        let cache = Self {
            http_client,
            jwks_uri,
            ttl,
            allow_http,
            cached: RwLock::new(None),
        };
        cache.validate_scheme()?;
        Ok(cache)
    }

    pub fn jwks_uri(&self) -> &Url {
        &self.jwks_uri
    }

    /// Gets a decoding key by key ID.
    ///
    /// Checks the cache first and refreshes once on a miss, so a rotated key
    /// is picked up without waiting for the TTL.
    pub async fn get_key(&self, kid: &str) -> Result<(DecodingKey, Option<Algorithm>), JwksError> {
        if let Some(result) = self.get_cached_key(kid).await {
            tracing::trace!(kid = %kid, "JWKS cache hit");
            return result;
        }

        tracing::debug!(kid = %kid, jwks_uri = %self.jwks_uri, "JWKS cache miss");
        self.refresh().await?;

        self.get_cached_key(kid)
            .await
            .unwrap_or_else(|| Err(JwksError::KeyNotFound(kid.to_string())))
    }

    async fn get_cached_key(
        &self,
        kid: &str,
    ) -> Option<Result<(DecodingKey, Option<Algorithm>), JwksError>> {
        let cached = self.cached.read().await;
        let cached = cached.as_ref().filter(|c| Instant::now() < c.expires_at)?;

        let jwk = cached
            .jwks
            .keys
            .iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid))?;

        Some(decoding_key(jwk))
    }

    /// Gets all signing keys, for tokens that carry no `kid`.
    pub async fn find_signing_keys(&self) -> Result<Vec<(DecodingKey, Option<Algorithm>)>, JwksError> {
        self.ensure_cached().await?;

        let cached = self.cached.read().await;
        let cached = cached
            .as_ref()
            .ok_or_else(|| JwksError::NetworkError("Cache miss after refresh".to_string()))?;

        let keys: Vec<_> = cached
            .jwks
            .keys
            .iter()
            .filter(|k| !matches!(&k.common.public_key_use, Some(PublicKeyUse::Encryption)))
            .filter_map(|jwk| decoding_key(jwk).ok())
            .collect();

        if keys.is_empty() {
            Err(JwksError::NoSigningKeys)
        } else {
            Ok(keys)
        }
    }

    async fn ensure_cached(&self) -> Result<(), JwksError> {
        {
            let cached = self.cached.read().await;
            if let Some(c) = cached.as_ref()
                && Instant::now() < c.expires_at
            {
                return Ok(());
            }
        }
        self.refresh().await
    }

    /// Fetches the key set from the issuer, regardless of cache state.
    pub async fn refresh(&self) -> Result<(), JwksError> {
        tracing::debug!(jwks_uri = %self.jwks_uri, "Fetching JWKS");

        let response = self
            .http_client
            .get(self.jwks_uri.as_str())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(jwks_uri = %self.jwks_uri, error = %e, "Failed to fetch JWKS");
                JwksError::NetworkError(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(JwksError::HttpError(response.status().as_u16()));
        }

        if let Some(len) = response.content_length()
            && len as usize > MAX_RESPONSE_SIZE
        {
            return Err(JwksError::ResponseTooLarge {
                max_size: MAX_RESPONSE_SIZE,
            });
        }

        let body = read_limited(response, MAX_RESPONSE_SIZE).await?;
        let jwks: JwkSet = serde_json::from_slice(&body).map_err(|e| {
            tracing::warn!(jwks_uri = %self.jwks_uri, error = %e, "Failed to parse JWKS");
            JwksError::ParseError(e.to_string())
        })?;

        tracing::debug!(keys = jwks.keys.len(), ttl = ?self.ttl, "Cached JWKS");

        *self.cached.write().await = Some(CachedJwks {
            jwks,
            expires_at: Instant::now() + self.ttl,
        });
        Ok(())
    }

    /// Drops the cached key set; the next lookup fetches it again.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    pub async fn is_cached(&self) -> bool {
        self.cached.read().await.is_some()
    }

    fn validate_scheme(&self) -> Result<(), JwksError> {
        match self.jwks_uri.scheme() {
            "https" => Ok(()),
            "http" if self.allow_http => Ok(()),
            _ => Err(JwksError::InvalidScheme),
        }
    }
}

/// Reads the body chunk by chunk, failing as soon as it grows past
/// `max_size`. A missing or understated `Content-Length` does not bypass the
/// limit.
async fn read_limited(mut response: reqwest::Response, max_size: usize) -> Result<Vec<u8>, JwksError> {
    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| JwksError::NetworkError(e.to_string()))?
    {
        if body.len() + chunk.len() > max_size {
            return Err(JwksError::ResponseTooLarge { max_size });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Option<Algorithm>), JwksError> {
    DecodingKey::from_jwk(jwk)
        .map(|dk| (dk, jwk_algorithm(jwk)))
        .map_err(|e| JwksError::InvalidKey(e.to_string()))
}

fn jwk_algorithm(jwk: &Jwk) -> Option<Algorithm> {
    jwk.common.key_algorithm.as_ref().and_then(|alg| match alg {
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    })
}
