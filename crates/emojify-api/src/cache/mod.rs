//! Cache client contract and its backends.
//!
//! The gateway never writes to the cache. Artifacts are produced by the
//! emojify workers; the gateway only asks whether one exists and, for the
//! `/cache` route, reads it back.
//!
//! | Backend  | Storage                              |
//! |----------|--------------------------------------|
//! | `remote` | cache service over HTTP              |
//! | `redis`  | Redis keys written by the workers    |
//! | `file`   | directory of files named by key      |
//! | `memory` | in-process map (development, tests)  |

mod file;
mod memory;
mod redis_cache;
mod remote;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{CacheBackendKind, CacheConfig};
use crate::validation::CacheKey;

pub use file::FileCache;
pub use memory::MemoryCache;
pub use redis_cache::RedisCache;
pub use remote::RemoteCache;

/// Key used by the health aggregator's liveness probe. It is never written,
/// so a reachable cache answers `NotFound`.
pub const HEALTH_PROBE_KEY: &str = "health-probe";

/// Raw bytes of a processed image.
pub type Artifact = Vec<u8>;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The key has no artifact. Only returned by `get`.
    #[error("cache entry not found")]
    NotFound,

    /// The backend could not be reached or timed out.
    #[error("cache unavailable: {message}")]
    Unavailable { message: String },

    /// The backend answered, but not in a way the client understands.
    #[error("cache backend error: {message}")]
    Backend { message: String },
}

impl CacheError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CacheError::unavailable(format!("request timed out: {e}"))
        } else if e.is_connect() {
            CacheError::unavailable(format!("failed to connect: {e}"))
        } else if e.is_decode() {
            CacheError::backend(e.to_string())
        } else {
            CacheError::unavailable(e.to_string())
        }
    }
}

/// Read-only view of the artifact cache.
///
/// Absence is an answer, not a failure: `exists` returns `Ok(false)` and
/// `get` returns `Err(CacheError::NotFound)`. Every other error means the
/// backend itself misbehaved.
#[async_trait]
pub trait CacheClient: Send + Sync {
    async fn exists(&self, key: &CacheKey) -> Result<bool, CacheError>;

    async fn get(&self, key: &CacheKey) -> Result<Artifact, CacheError>;

    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}

/// Builds the cache client selected by `cache.backend`.
pub async fn create_cache_client(config: &CacheConfig) -> Result<Arc<dyn CacheClient>, CacheError> {
    tracing::info!(backend = %config.backend, "Creating cache client");

    let client: Arc<dyn CacheClient> = match config.backend {
        CacheBackendKind::Remote => Arc::new(RemoteCache::new(
            &config.remote.url,
            config.remote.timeout(),
        )?),
        CacheBackendKind::Redis => Arc::new(RedisCache::connect(&config.redis).await?),
        CacheBackendKind::File => Arc::new(FileCache::new(&config.file.path)),
        CacheBackendKind::Memory => Arc::new(MemoryCache::new()),
    };
    Ok(client)
}
