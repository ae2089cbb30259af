//! Validation of submitted image URLs and cache key derivation.

use std::fmt;

use sha2::{Digest, Sha256};
use url::Url;

/// Shortest body that can still be an absolute http URL ("http://a").
pub const MIN_URL_LEN: usize = 8;

/// A submitted body that is not a fetchable URL.
///
/// Displays as `"<input> is not a valid URL"`, with the input echoed exactly
/// as received.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{input} is not a valid URL")]
pub struct InvalidUrl {
    pub input: String,
}

/// Validates a raw request body as an absolute `http`/`https` URL.
///
/// Surrounding whitespace (e.g. a trailing newline from `curl -d @file`) is
/// ignored for parsing but kept in the echoed error input. The returned URL
/// is normalized by the parser (lowercased scheme and host, default port
/// dropped, empty path becomes `/`).
pub fn validate_url(raw: &[u8]) -> Result<Url, InvalidUrl> {
    let input = String::from_utf8_lossy(raw);
    let invalid = || InvalidUrl {
        input: input.to_string(),
    };

    let candidate = input.trim();
    if candidate.len() < MIN_URL_LEN {
        return Err(invalid());
    }

    let url = Url::parse(candidate).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid());
    }
    Ok(url)
}

/// Identifier correlating a cache lookup with the job that fills it.
///
/// SHA-256 of the normalized URL, lowercase hex. Equal URLs after
/// normalization always map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn from_url(url: &Url) -> Self {
        let digest = Sha256::digest(url.as_str().as_bytes());
        Self(hex::encode(digest))
    }

    /// Accepts an externally supplied key, e.g. one received on the `/cache`
    /// route. Keys are at most 128 characters of `[A-Za-z0-9._-]` and never
    /// start with a dot, so they are always safe as a file name.
    pub fn parse(raw: &str) -> Option<Self> {
        let well_formed = !raw.is_empty()
            && raw.len() <= 128
            && !raw.starts_with('.')
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
        well_formed.then(|| Self(raw.to_string()))
    }

    /// Fixed key that no artifact is ever stored under.
    pub fn health_probe() -> Self {
        Self(crate::cache::HEALTH_PROBE_KEY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
