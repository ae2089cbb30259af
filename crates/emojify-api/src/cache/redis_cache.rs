use std::time::Instant;

use async_trait::async_trait;
use deadpool_redis::{Pool, PoolConfig, Runtime};
use redis::AsyncCommands;

use super::{Artifact, CacheClient, CacheError};
use crate::config::RedisConfig;
use crate::metrics::{record_downstream_call, record_downstream_error};
use crate::validation::CacheKey;

const SERVICE: &str = "cache";

/// Artifacts stored in Redis under their cache key.
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
}

impl RedisCache {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Builds the pool and checks out one connection. Fails if Redis is not
    /// reachable.
    pub async fn connect(config: &RedisConfig) -> Result<Self, CacheError> {
        tracing::info!(url = %config.url, "Connecting to Redis");

        let mut redis_config = deadpool_redis::Config::from_url(config.connection_url());
        let mut pool_config = PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(config.timeout());
        pool_config.timeouts.create = Some(config.timeout());
        pool_config.timeouts.recycle = Some(config.timeout());
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::backend(format!("failed to create Redis pool: {e}")))?;

        pool.get()
            .await
            .map_err(|e| CacheError::unavailable(format!("failed to connect to Redis: {e}")))?;
        tracing::info!("Connected to Redis");

        Ok(Self::new(pool))
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, CacheError> {
        self.pool.get().await.map_err(|e| {
            record_downstream_error(SERVICE);
            CacheError::unavailable(format!("failed to get Redis connection: {e}"))
        })
    }
}

#[async_trait]
impl CacheClient for RedisCache {
    async fn exists(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let mut conn = self.connection().await?;
        let start = Instant::now();
        let result = conn.exists::<_, bool>(key.as_str()).await;
        record_downstream_call(SERVICE, "exists", start.elapsed());

        result.map_err(|e| {
            record_downstream_error(SERVICE);
            CacheError::unavailable(format!("Redis EXISTS failed: {e}"))
        })
    }

    async fn get(&self, key: &CacheKey) -> Result<Artifact, CacheError> {
        let mut conn = self.connection().await?;
        let start = Instant::now();
        let result = conn.get::<_, Option<Vec<u8>>>(key.as_str()).await;
        record_downstream_call(SERVICE, "get", start.elapsed());

        match result {
            Ok(Some(data)) => Ok(data),
            Ok(None) => Err(CacheError::NotFound),
            Err(e) => {
                record_downstream_error(SERVICE);
                Err(CacheError::unavailable(format!("Redis GET failed: {e}")))
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
