use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::{EmojifyResponse, Outcome};
use crate::cache::CacheClient;
use crate::jobs::JobClient;
use crate::metrics::record_outcome;
use crate::validation::{CacheKey, validate_url};

/// Turns a submitted body into a cache hit or a queued job.
///
/// Holds no per-request state; one instance is shared by every request.
#[derive(Clone)]
pub struct EmojifyOrchestrator {
    cache: Arc<dyn CacheClient>,
    jobs: Arc<dyn JobClient>,
}

impl EmojifyOrchestrator {
    pub fn new(cache: Arc<dyn CacheClient>, jobs: Arc<dyn JobClient>) -> Self {
        Self { cache, jobs }
    }

    pub async fn handle(&self, body: &[u8]) -> Outcome {
        let outcome = self.run(body).await;
        record_outcome(outcome.label());
        outcome
    }

    async fn run(&self, body: &[u8]) -> Outcome {
        let url = match validate_url(body) {
            Ok(url) => url,
            Err(err) => {
                debug!(input = %err.input, "rejected submission");
                return Outcome::Rejected(err);
            }
        };
        let key = CacheKey::from_url(&url);

        // A failing cache must not take submissions down with it.
        match self.cache.exists(&key).await {
            Ok(true) => {
                debug!(url = %url, key = %key, "artifact already cached");
                return Outcome::CacheHit;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(
                    url = %url,
                    key = %key,
                    backend = self.cache.backend_name(),
                    error = %e,
                    "cache check failed, treating as miss"
                );
            }
        }

        match self.jobs.create(&url).await {
            Ok(record) => {
                info!(
                    url = %url,
                    job_id = %record.id,
                    position = record.queue_position,
                    length = record.queue_length,
                    status = %record.status,
                    "queued emojify job"
                );
                Outcome::Submitted(EmojifyResponse::from(record))
            }
            Err(e) => {
                error!(url = %url, error = %e, "failed to queue emojify job");
                Outcome::SubmissionFailed
            }
        }
    }
}
