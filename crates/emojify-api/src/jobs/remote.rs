use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use url::Url;

use super::{JobClient, JobError, JobRecord};
use crate::metrics::{record_downstream_call, record_downstream_error};

const SERVICE: &str = "jobs";

/// Longest downstream error body kept for logging.
const MAX_ERROR_BODY: usize = 1024;

#[derive(Serialize)]
struct CreateJobRequest<'a> {
    url: &'a str,
}

/// Job service reached over HTTP.
///
/// `POST /jobs` with `{"url": ...}` submits and `GET /health` is the
/// liveness probe.
#[derive(Debug, Clone)]
pub struct RemoteJobClient {
    client: Client,
    base_url: Url,
}

impl RemoteJobClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, JobError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            JobError::invalid_response(format!("invalid job service url '{base_url}': {e}"))
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| JobError::unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segment: &str) -> Result<Url, JobError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| JobError::invalid_response("job service url cannot be a base"))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }
}

#[async_trait]
impl JobClient for RemoteJobClient {
    async fn create(&self, url: &Url) -> Result<JobRecord, JobError> {
        let endpoint = self.endpoint("jobs")?;
        let start = Instant::now();
        let result = self
            .client
            .post(endpoint)
            .json(&CreateJobRequest { url: url.as_str() })
            .send()
            .await;
        record_downstream_call(SERVICE, "create", start.elapsed());

        let response = result.inspect_err(|_| record_downstream_error(SERVICE))?;
        let status = response.status();
        if !status.is_success() {
            record_downstream_error(SERVICE);
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut end = MAX_ERROR_BODY;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }
            return Err(JobError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<JobRecord>().await.map_err(|e| {
            record_downstream_error(SERVICE);
            JobError::invalid_response(e.to_string())
        })
    }

    async fn probe(&self) -> Result<(), JobError> {
        let endpoint = self.endpoint("health")?;
        let start = Instant::now();
        let result = self.client.get(endpoint).send().await;
        record_downstream_call(SERVICE, "probe", start.elapsed());

        result.inspect_err(|_| record_downstream_error(SERVICE))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_path() {
        let client = RemoteJobClient::new("http://jobs:9092", Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint("jobs").unwrap().as_str(), "http://jobs:9092/jobs");

        let client = RemoteJobClient::new("http://jobs:9092/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint("health").unwrap().as_str(),
            "http://jobs:9092/api/health"
        );
    }
}
