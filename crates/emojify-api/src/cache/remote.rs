use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

use super::{Artifact, CacheClient, CacheError};
use crate::metrics::{record_downstream_call, record_downstream_error};
use crate::validation::CacheKey;

const SERVICE: &str = "cache";

/// Cache service reached over HTTP.
///
/// `HEAD /cache/{key}` answers existence and `GET /cache/{key}` returns the
/// artifact. `404` means absent on both.
#[derive(Debug, Clone)]
pub struct RemoteCache {
    client: Client,
    base_url: Url,
}

impl RemoteCache {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| CacheError::backend(format!("invalid cache url '{base_url}': {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::backend(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn entry_url(&self, key: &CacheKey) -> Result<Url, CacheError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CacheError::backend("cache url cannot be a base"))?
            .pop_if_empty()
            .extend(["cache", key.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl CacheClient for RemoteCache {
    async fn exists(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let url = self.entry_url(key)?;
        let start = Instant::now();
        let result = self.client.head(url).send().await;
        record_downstream_call(SERVICE, "exists", start.elapsed());

        let response = result.inspect_err(|_| record_downstream_error(SERVICE))?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                record_downstream_error(SERVICE);
                Err(CacheError::backend(format!("unexpected status {status}")))
            }
        }
    }

    async fn get(&self, key: &CacheKey) -> Result<Artifact, CacheError> {
        let url = self.entry_url(key)?;
        let start = Instant::now();
        let result = self.client.get(url).send().await;
        record_downstream_call(SERVICE, "get", start.elapsed());

        let response = result.inspect_err(|_| record_downstream_error(SERVICE))?;
        match response.status() {
            status if status.is_success() => {
                let body = response.bytes().await?;
                Ok(body.to_vec())
            }
            StatusCode::NOT_FOUND => Err(CacheError::NotFound),
            status => {
                record_downstream_error(SERVICE);
                Err(CacheError::backend(format!("unexpected status {status}")))
            }
        }
    }

    fn backend_name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_url_joins_path() {
        let key = CacheKey::parse("abc").unwrap();

        let cache = RemoteCache::new("http://cache:9091", Duration::from_secs(1)).unwrap();
        assert_eq!(
            cache.entry_url(&key).unwrap().as_str(),
            "http://cache:9091/cache/abc"
        );

        let cache = RemoteCache::new("http://cache:9091/v1/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            cache.entry_url(&key).unwrap().as_str(),
            "http://cache:9091/v1/cache/abc"
        );
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(RemoteCache::new("not a url", Duration::from_secs(1)).is_err());
    }
}
