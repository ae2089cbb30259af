use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use url::Url;

use super::{JobClient, JobError, JobRecord, JobStatus};

#[derive(Debug, Default)]
struct State {
    submitted: Vec<Url>,
    next_record: Option<JobRecord>,
    failure: Option<String>,
}

/// In-process job queue.
///
/// Every submission is recorded. By default a submission is queued at the
/// back of the queue with a sequential id; tests can pin the next record or
/// make submissions fail.
#[derive(Debug, Default)]
pub struct MemoryJobClient {
    state: Mutex<State>,
    unreachable: AtomicBool,
}

impl MemoryJobClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers every following submission with `record`.
    pub async fn respond_with(&self, record: JobRecord) {
        self.state.lock().await.next_record = Some(record);
    }

    /// Fails every following submission with [`JobError::Rejected`] carrying
    /// `message` as the downstream body.
    pub async fn fail_with(&self, message: impl Into<String>) {
        self.state.lock().await.failure = Some(message.into());
    }

    /// While set, submissions and probes fail as if the service were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub async fn submitted(&self) -> Vec<Url> {
        self.state.lock().await.submitted.clone()
    }

    pub async fn create_calls(&self) -> usize {
        self.state.lock().await.submitted.len()
    }

    fn check_reachable(&self) -> Result<(), JobError> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(JobError::unavailable("memory job queue marked unreachable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl JobClient for MemoryJobClient {
    async fn create(&self, url: &Url) -> Result<JobRecord, JobError> {
        let mut state = self.state.lock().await;
        state.submitted.push(url.clone());
        self.check_reachable()?;

        if let Some(message) = &state.failure {
            return Err(JobError::Rejected {
                status: 500,
                body: message.clone(),
            });
        }
        if let Some(record) = &state.next_record {
            return Ok(record.clone());
        }

        let length = i32::try_from(state.submitted.len()).unwrap_or(i32::MAX);
        Ok(JobRecord {
            id: format!("job-{length}"),
            queue_position: length,
            queue_length: length,
            status: JobStatus::Queued,
        })
    }

    async fn probe(&self) -> Result<(), JobError> {
        self.check_reachable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_sequential_queue() {
        let jobs = MemoryJobClient::new();

        let first = jobs.create(&url("http://example.com/a.png")).await.unwrap();
        let second = jobs.create(&url("http://example.com/b.png")).await.unwrap();

        assert_eq!(first.id, "job-1");
        assert_eq!(second.queue_position, 2);
        assert_eq!(second.queue_length, 2);
        assert_eq!(jobs.create_calls().await, 2);
        assert_eq!(jobs.submitted().await[1].as_str(), "http://example.com/b.png");
    }

    #[tokio::test]
    async fn test_pinned_record_and_failure() {
        let jobs = MemoryJobClient::new();
        let record = JobRecord {
            id: "abc".into(),
            queue_position: 2,
            queue_length: 4,
            status: JobStatus::Queued,
        };
        jobs.respond_with(record.clone()).await;
        assert_eq!(jobs.create(&url("http://example.com/a.png")).await.unwrap(), record);

        jobs.fail_with("queue full").await;
        let err = jobs.create(&url("http://example.com/a.png")).await.unwrap_err();
        assert!(matches!(err, JobError::Rejected { status: 500, .. }));
    }

    #[test]
    fn test_unreachable() {
        use tokio_test::{assert_err, assert_ok, block_on};

        let jobs = MemoryJobClient::new();
        assert_ok!(block_on(jobs.probe()));

        jobs.set_unreachable(true);
        assert!(matches!(block_on(jobs.probe()), Err(JobError::Unavailable { .. })));
        assert_err!(block_on(jobs.create(&url("http://example.com/a.png"))));
    }
}
