use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{Artifact, CacheClient, CacheError};
use crate::validation::CacheKey;

/// Directory of artifacts, one file per cache key.
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }
}

#[async_trait]
impl CacheClient for FileCache {
    async fn exists(&self, key: &CacheKey) -> Result<bool, CacheError> {
        match tokio::fs::metadata(self.entry_path(key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::unavailable(format!(
                "failed to stat cache entry: {e}"
            ))),
        }
    }

    async fn get(&self, key: &CacheKey) -> Result<Artifact, CacheError> {
        match tokio::fs::read(self.entry_path(key)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(CacheError::NotFound),
            Err(e) => Err(CacheError::unavailable(format!(
                "failed to read cache entry: {e}"
            ))),
        }
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_artifacts_by_key() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abc123"), b"\x89PNG data").unwrap();
        let cache = FileCache::new(dir.path());

        let hit = CacheKey::parse("abc123").unwrap();
        let miss = CacheKey::parse("def456").unwrap();

        assert!(cache.exists(&hit).await.unwrap());
        assert!(!cache.exists(&miss).await.unwrap());
        assert_eq!(cache.get(&hit).await.unwrap(), b"\x89PNG data");
        assert!(matches!(cache.get(&miss).await, Err(CacheError::NotFound)));
    }

    #[tokio::test]
    async fn test_directory_is_not_an_entry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let cache = FileCache::new(dir.path());

        let key = CacheKey::parse("nested").unwrap();
        assert!(!cache.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_root_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("not-created"));

        let key = CacheKey::parse("abc").unwrap();
        assert!(!cache.exists(&key).await.unwrap());
        assert!(matches!(cache.get(&key).await, Err(CacheError::NotFound)));
    }
}
