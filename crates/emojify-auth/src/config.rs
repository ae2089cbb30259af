//! Authentication configuration.
//!
//! The gateway does not issue tokens. It only needs to know where the issuer
//! publishes its signing keys and which audience tokens must be minted for.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth]
//! enabled = true
//! issuer = "http://localhost:3000"
//! audience = "emojify"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Root authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Enable/disable the bearer gate entirely.
    /// When disabled, every request reaches the orchestrator unauthenticated.
    pub enabled: bool,

    /// Issuer base URL. Tokens must carry this value in their `iss` claim,
    /// with or without a trailing slash.
    pub issuer: String,

    /// Expected `aud` claim.
    pub audience: String,

    /// Path of the JWKS document relative to the issuer.
    pub jwks_path: String,

    /// Whether plain HTTP issuers are accepted.
    pub allow_http: bool,

    /// Timeout for a single JWKS fetch, in milliseconds.
    pub request_timeout_ms: u64,

    /// How long a fetched key set is trusted before it is fetched again.
    pub jwks_ttl_secs: u64,

    /// Clock skew tolerated when checking `exp`/`nbf`.
    pub leeway_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            issuer: "http://localhost:3000".to_string(),
            audience: "emojify".to_string(),
            jwks_path: "/.well-known/jwks.json".to_string(),
            allow_http: true,
            request_timeout_ms: 3000,
            jwks_ttl_secs: 300,
            leeway_secs: 30,
        }
    }
}

impl AuthConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let issuer = self.issuer_url()?;

        match issuer.scheme() {
            "https" => {}
            "http" if self.allow_http => {}
            other => return Err(ConfigError::InvalidScheme(other.to_string())),
        }

        if self.audience.trim().is_empty() {
            return Err(ConfigError::MissingField("audience"));
        }
        if !self.jwks_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "jwks_path",
                message: "must start with '/'".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                message: "must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Parses the issuer as a URL.
    pub fn issuer_url(&self) -> Result<Url, ConfigError> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::MissingField("issuer"));
        }
        Url::parse(&self.issuer).map_err(|e| ConfigError::InvalidValue {
            field: "issuer",
            message: e.to_string(),
        })
    }

    /// Location of the issuer's key set.
    pub fn jwks_url(&self) -> Result<Url, ConfigError> {
        let issuer = self.issuer_url()?;
        let mut jwks = issuer.clone();
        let base = issuer.path().trim_end_matches('/');
        jwks.set_path(&format!("{}{}", base, self.jwks_path));
        Ok(jwks)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn jwks_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_ttl_secs)
    }
}

/// Errors found while validating [`AuthConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("auth.{0} must be set")]
    MissingField(&'static str),

    #[error("auth.{field} is invalid: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    #[error("auth.issuer scheme '{0}' is not allowed")]
    InvalidScheme(String),
}
