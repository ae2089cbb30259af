use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Artifact, CacheClient, CacheError};
use crate::validation::CacheKey;

/// In-process cache.
///
/// Serves the `memory` backend for local development and doubles as the
/// deterministic cache in tests: calls are counted and the whole cache can be
/// switched into an unreachable state.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, Artifact>>,
    unavailable: AtomicBool,
    exists_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, key: CacheKey, artifact: impl Into<Artifact>) {
        self.entries.write().await.insert(key, artifact.into());
    }

    pub async fn remove(&self, key: &CacheKey) -> Option<Artifact> {
        self.entries.write().await.remove(key)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// While set, every call fails with [`CacheError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), CacheError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(CacheError::unavailable("memory cache marked unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    async fn exists(&self, key: &CacheKey) -> Result<bool, CacheError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.entries.read().await.contains_key(key))
    }

    async fn get(&self, key: &CacheKey) -> Result<Artifact, CacheError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        self.entries
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or(CacheError::NotFound)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let cache = MemoryCache::new();
        let key = CacheKey::parse("abc").unwrap();

        assert!(!cache.exists(&key).await.unwrap());
        assert!(matches!(cache.get(&key).await, Err(CacheError::NotFound)));

        cache.insert(key.clone(), b"png".to_vec()).await;
        assert!(cache.exists(&key).await.unwrap());
        assert_eq!(cache.get(&key).await.unwrap(), b"png");
        assert_eq!(cache.len().await, 1);

        assert_eq!(cache.exists_calls(), 2);
        assert_eq!(cache.get_calls(), 2);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let cache = MemoryCache::new();
        let key = CacheKey::parse("abc").unwrap();
        cache.insert(key.clone(), b"png".to_vec()).await;

        cache.set_unavailable(true);
        assert!(matches!(
            cache.exists(&key).await,
            Err(CacheError::Unavailable { .. })
        ));
        assert!(matches!(
            cache.get(&key).await,
            Err(CacheError::Unavailable { .. })
        ));

        cache.set_unavailable(false);
        assert!(cache.exists(&key).await.unwrap());
    }
}
