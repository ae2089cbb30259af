//! Authentication error types.

use crate::jwks::JwksError;

/// Errors that can occur while authenticating a request.
///
/// Every variant is terminal for the request: the gate answers
/// `401 Unauthorized` and the wrapped handler never runs.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No `Authorization` header was sent.
    #[error("Authentication required")]
    MissingCredentials,

    /// The `Authorization` header is not a non-empty `Bearer` credential.
    #[error("Invalid Authorization header format")]
    InvalidHeader,

    /// The token is malformed, has a bad signature, or carries the wrong
    /// issuer or audience.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The token's `exp` claim is in the past.
    #[error("Token expired")]
    TokenExpired,

    /// The issuer's key set could not be fetched.
    #[error("Identity issuer unavailable: {message}")]
    IssuerUnavailable {
        /// Description of the transport failure.
        message: String,
    },
}

impl AuthError {
    /// Creates an invalid token error.
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// OAuth 2.0 error code used in the `WWW-Authenticate` challenge.
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::MissingCredentials | Self::InvalidHeader => "invalid_request",
            Self::InvalidToken { .. } | Self::TokenExpired => "invalid_token",
            Self::IssuerUnavailable { .. } => "temporarily_unavailable",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::TokenExpired,
            ErrorKind::InvalidAudience => Self::invalid_token("audience mismatch"),
            ErrorKind::InvalidIssuer => Self::invalid_token("issuer mismatch"),
            ErrorKind::InvalidSignature => Self::invalid_token("signature verification failed"),
            _ => Self::invalid_token(err.to_string()),
        }
    }
}

impl From<JwksError> for AuthError {
    fn from(err: JwksError) -> Self {
        match err {
            JwksError::KeyNotFound(kid) => Self::invalid_token(format!("unknown key id '{kid}'")),
            JwksError::NoSigningKeys => Self::invalid_token("issuer publishes no signing keys"),
            JwksError::InvalidKey(message) => Self::invalid_token(message),
            other => Self::IssuerUnavailable {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            AuthError::MissingCredentials.to_string(),
            "Authentication required"
        );
        assert_eq!(AuthError::TokenExpired.to_string(), "Token expired");
        assert_eq!(
            AuthError::invalid_token("bad").to_string(),
            "Invalid token: bad"
        );
    }

    #[test]
    fn test_jwks_errors_map_to_issuer_or_token_failures() {
        let err: AuthError = JwksError::NetworkError("connection refused".into()).into();
        assert!(matches!(err, AuthError::IssuerUnavailable { .. }));

        let err: AuthError = JwksError::HttpError(503).into();
        assert!(matches!(err, AuthError::IssuerUnavailable { .. }));

        let err: AuthError = JwksError::KeyNotFound("k1".into()).into();
        assert!(matches!(err, AuthError::InvalidToken { .. }));
    }

    #[test]
    fn test_oauth_error_codes() {
        assert_eq!(
            AuthError::MissingCredentials.oauth_error_code(),
            "invalid_request"
        );
        assert_eq!(AuthError::TokenExpired.oauth_error_code(), "invalid_token");
    }
}
