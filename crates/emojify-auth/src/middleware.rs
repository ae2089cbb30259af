//! Axum bearer-token gate.
//!
//! ```ignore
//! let auth = AuthState::new(Arc::new(RemoteTokenVerifier::from_config(&cfg)?));
//! let protected = Router::new()
//!     .route("/", post(handler))
//!     .route_layer(middleware::from_fn_with_state(auth, require_bearer));
//! ```

use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;
use crate::verifier::{TokenClaims, TokenVerifier};

/// State shared by the gate.
#[derive(Clone)]
pub struct AuthState {
    verifier: Arc<dyn TokenVerifier>,
}

impl AuthState {
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }
}

/// Rejects the request with `401 Unauthorized` unless it carries a bearer
/// token the verifier accepts. Verified claims are stored in the request
/// extensions; the request is otherwise passed on unchanged.
pub async fn require_bearer(
    State(state): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = match extract_bearer(req.headers()) {
        Ok(token) => token,
        Err(e) => {
            tracing::debug!(path = %req.uri().path(), error = %e, "Rejecting request");
            return e.into_response();
        }
    };

    match state.verifier.verify(&token).await {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            if matches!(e, AuthError::IssuerUnavailable { .. }) {
                tracing::warn!(error = %e, "Token verification failed");
            } else {
                tracing::debug!(error = %e, "Token verification failed");
            }
            e.into_response()
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn extract_bearer(headers: &HeaderMap) -> Result<String, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthError::InvalidHeader)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthError::InvalidHeader)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::InvalidHeader);
    }
    Ok(token.to_string())
}

/// Returns the claims stored by [`require_bearer`], if any.
pub fn verified_claims<B>(req: &Request<B>) -> Option<&TokenClaims> {
    req.extensions().get::<TokenClaims>()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let code = self.oauth_error_code();
        // Transport detail about the issuer stays in the logs.
        let description = match &self {
            AuthError::IssuerUnavailable { .. } => "Unable to verify credentials".to_string(),
            other => other.to_string(),
        };

        let mut headers = HeaderMap::new();
        let challenge = format!(r#"Bearer error="{code}", error_description="{description}""#);
        if let Ok(value) = HeaderValue::from_str(&challenge) {
            headers.insert(header::WWW_AUTHENTICATE, value);
        }

        let body = json!({
            "error": code,
            "error_description": description,
        });
        (StatusCode::UNAUTHORIZED, headers, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(
            extract_bearer(&headers_with("Bearer abc.def.ghi")).unwrap(),
            "abc.def.ghi"
        );
        assert_eq!(
            extract_bearer(&headers_with("bearer abc")).unwrap(),
            "abc"
        );
    }

    #[test]
    fn test_extract_bearer_errors() {
        assert!(matches!(
            extract_bearer(&HeaderMap::new()),
            Err(AuthError::MissingCredentials)
        ));
        assert!(matches!(
            extract_bearer(&headers_with("Basic dXNlcjpwYXNz")),
            Err(AuthError::InvalidHeader)
        ));
        assert!(matches!(
            extract_bearer(&headers_with("Bearer ")),
            Err(AuthError::InvalidHeader)
        ));
        assert!(matches!(
            extract_bearer(&headers_with("Bearer")),
            Err(AuthError::InvalidHeader)
        ));
    }

    #[test]
    fn test_error_response_is_unauthorized_with_challenge() {
        let response = AuthError::TokenExpired.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(challenge.starts_with("Bearer error=\"invalid_token\""));
    }

    #[test]
    fn test_issuer_detail_not_exposed() {
        let response = AuthError::IssuerUnavailable {
            message: "connection refused to 10.0.0.7:3000".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(!challenge.contains("10.0.0.7"));
    }
}
