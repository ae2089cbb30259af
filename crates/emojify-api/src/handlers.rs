use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::cache::CacheError;
use crate::gateway::Outcome;
use crate::health::HealthStatus;
use crate::server::AppState;
use crate::validation::CacheKey;

/// `POST /` - submit an image URL for emojification.
pub async fn emojify(State(state): State<AppState>, body: Bytes) -> Outcome {
    state.orchestrator.handle(&body).await
}

/// `GET /health` - composite liveness of the cache and job service.
pub async fn health(State(state): State<AppState>) -> HealthStatus {
    state.health.check().await
}

#[derive(Debug, Deserialize)]
pub struct CacheQuery {
    pub file: Option<String>,
}

/// `GET /cache?file=<key>` - download a processed image.
pub async fn cached_artifact(
    State(state): State<AppState>,
    Query(query): Query<CacheQuery>,
) -> Response {
    let Some(file) = query.file.filter(|f| !f.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing file parameter\n").into_response();
    };
    let Some(key) = CacheKey::parse(&file) else {
        return (StatusCode::BAD_REQUEST, "invalid file parameter\n").into_response();
    };

    match state.cache.get(&key).await {
        Ok(artifact) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, sniff_content_type(&artifact))],
            artifact,
        )
            .into_response(),
        Err(CacheError::NotFound) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!(key = %key, error = %e, "failed to read cached artifact");
            (StatusCode::BAD_GATEWAY, "unable to read cache\n").into_response()
        }
    }
}

/// `GET /metrics` - Prometheus exposition.
pub async fn metrics(State(state): State<AppState>) -> Response {
    if !state.metrics_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }
    match crate::metrics::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Content type of an artifact from its leading magic bytes.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        "image/png"
    } else if data.starts_with(&[0xff, 0xd8, 0xff]) {
        "image/jpeg"
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        "image/gif"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_content_type() {
        assert_eq!(sniff_content_type(b"\x89PNG\r\n\x1a\n...."), "image/png");
        assert_eq!(sniff_content_type(&[0xff, 0xd8, 0xff, 0xe0]), "image/jpeg");
        assert_eq!(sniff_content_type(b"GIF89a...."), "image/gif");
        assert_eq!(sniff_content_type(b"hello"), "application/octet-stream");
        assert_eq!(sniff_content_type(b""), "application/octet-stream");
    }
}
