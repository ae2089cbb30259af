//! # emojify-auth
//!
//! Bearer token gate for the Emojify gateway.
//!
//! Tokens are issued elsewhere. This crate only verifies them:
//!
//! - [`config`] - issuer location, audience and fetch settings
//! - [`jwks`] - fetching and caching the issuer's signing keys
//! - [`verifier`] - signature/issuer/audience/expiry checks
//! - [`middleware`] - axum middleware returning `401` on failure

pub mod config;
pub mod error;
pub mod jwks;
pub mod middleware;
pub mod verifier;

pub use config::{AuthConfig, ConfigError};
pub use error::AuthError;
pub use jwks::{JwksCache, JwksError};
pub use middleware::{AuthState, extract_bearer, require_bearer, verified_claims};
pub use verifier::{RemoteTokenVerifier, TokenClaims, TokenVerifier};

/// Type alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;
