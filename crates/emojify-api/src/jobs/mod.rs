//! Job service contract.
//!
//! Submitting a URL hands it to the emojify workers and returns the queue
//! snapshot the job service assigned to it. The gateway does not dedup
//! submissions; that is what the cache check in front of it is for.

mod memory;
mod remote;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

pub use memory::MemoryJobClient;
pub use remote::RemoteJobClient;

/// Processing state reported by the job service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Error,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "QUEUED"),
            JobStatus::Processing => write!(f, "PROCESSING"),
            JobStatus::Done => write!(f, "DONE"),
            JobStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Snapshot of a job at submission time. Owned by the job service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub queue_position: i32,
    pub queue_length: i32,
    pub status: JobStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The job service could not be reached or timed out.
    #[error("job service unavailable: {message}")]
    Unavailable { message: String },

    /// The job service refused the submission.
    #[error("job service rejected submission with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The job service answered with something that is not a job record.
    #[error("invalid response from job service: {message}")]
    InvalidResponse { message: String },
}

impl JobError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for JobError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            JobError::unavailable(format!("request timed out: {e}"))
        } else if e.is_connect() {
            JobError::unavailable(format!("failed to connect: {e}"))
        } else if e.is_decode() {
            JobError::invalid_response(e.to_string())
        } else {
            JobError::unavailable(e.to_string())
        }
    }
}

#[async_trait]
pub trait JobClient: Send + Sync {
    /// Queues `url` for processing. Called at most once per request.
    async fn create(&self, url: &Url) -> Result<JobRecord, JobError>;

    /// Liveness check. Any answer from the service counts as reachable.
    async fn probe(&self) -> Result<(), JobError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_record_wire_format() {
        let record: JobRecord = serde_json::from_str(
            r#"{"id":"abc","queue_position":2,"queue_length":4,"status":"QUEUED"}"#,
        )
        .unwrap();
        assert_eq!(record.id, "abc");
        assert_eq!(record.queue_position, 2);
        assert_eq!(record.queue_length, 4);
        assert_eq!(record.status, JobStatus::Queued);

        let json = serde_json::to_value(JobStatus::Processing).unwrap();
        assert_eq!(json, "PROCESSING");
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let result = serde_json::from_str::<JobRecord>(
            r#"{"id":"abc","queue_position":2,"queue_length":4,"status":"LOST"}"#,
        );
        assert!(result.is_err());
    }
}
