//! Bearer token verification against the configured issuer.

use std::collections::HashMap;

use async_trait::async_trait;
use jsonwebtoken::{DecodingKey, Validation, decode_header};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::jwks::JwksCache;

/// Claims the gateway cares about. Anything else is kept in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: String,

    pub iss: String,

    #[serde(default, deserialize_with = "deserialize_audience")]
    pub aud: Vec<String>,

    pub exp: i64,

    #[serde(default)]
    pub iat: Option<i64>,

    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Verifies a raw bearer token.
///
/// The gate depends only on this trait; [`RemoteTokenVerifier`] is the
/// production implementation.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<TokenClaims, AuthError>;
}

/// Verifies RS/ES/PS/EdDSA-signed JWTs using the issuer's published JWKS,
/// checking signature, `iss`, `aud` and `exp`.
pub struct RemoteTokenVerifier {
    issuer: String,
    audience: String,
    leeway_secs: u64,
    jwks: JwksCache,
}

impl RemoteTokenVerifier {
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let jwks = JwksCache::from_config(config)?;
        Ok(Self::new(
            config.issuer.clone(),
            config.audience.clone(),
            config.leeway_secs,
            jwks,
        ))
    }

    pub fn new(issuer: String, audience: String, leeway_secs: u64, jwks: JwksCache) -> Self {
        Self {
            issuer: issuer.trim_end_matches('/').to_string(),
            audience,
            leeway_secs,
            jwks,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    fn validation(&self, alg: jsonwebtoken::Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.set_audience(&[&self.audience]);
        // `iss` is compared verbatim; accept the issuer with and without a
        // trailing slash.
        let with_slash = format!("{}/", self.issuer);
        validation.set_issuer(&[self.issuer.as_str(), with_slash.as_str()]);
        validation.leeway = self.leeway_secs;
        validation
    }

    fn decode_with(
        &self,
        token: &str,
        key: &DecodingKey,
        alg: jsonwebtoken::Algorithm,
    ) -> Result<TokenClaims, AuthError> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, key, &self.validation(alg))?;
        Ok(data.claims)
    }
}

#[async_trait]
impl TokenVerifier for RemoteTokenVerifier {
    async fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let header = decode_header(token)?;

        let claims = match header.kid.as_deref() {
            Some(kid) => {
                let (key, key_alg) = self.jwks.get_key(kid).await?;
                self.decode_with(token, &key, key_alg.unwrap_or(header.alg))?
            }
            None => {
                // Without a kid every published signing key is a candidate.
                let mut last_err = AuthError::invalid_token("no matching signing key");
                let mut verified = None;
                for (key, key_alg) in self.jwks.find_signing_keys().await? {
                    match self.decode_with(token, &key, key_alg.unwrap_or(header.alg)) {
                        Ok(claims) => {
                            verified = Some(claims);
                            break;
                        }
                        Err(e) => last_err = e,
                    }
                }
                verified.ok_or(last_err)?
            }
        };

        tracing::debug!(subject = %claims.sub, issuer = %claims.iss, "Token verified");
        Ok(claims)
    }
}

/// Audience can be a single string or an array.
fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => Ok(vec![s]),
        OneOrMany::Many(v) => Ok(v),
    }
}
