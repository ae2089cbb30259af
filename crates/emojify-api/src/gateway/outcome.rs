use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::jobs::JobRecord;
use crate::validation::InvalidUrl;

/// Body of the 500 returned when the job service fails. Never carries the
/// downstream error.
pub const SUBMISSION_FAILED_BODY: &str = "Unable to queue image for processing\n";

/// Wire projection of a [`JobRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmojifyResponse {
    pub id: String,
    pub position: i32,
    pub length: i32,
}

impl From<JobRecord> for EmojifyResponse {
    fn from(record: JobRecord) -> Self {
        Self {
            id: record.id,
            position: record.queue_position,
            length: record.queue_length,
        }
    }
}

/// Terminal state of one orchestrated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Body was not a fetchable URL.
    Rejected(InvalidUrl),
    /// The artifact already exists; nothing was submitted.
    CacheHit,
    /// A job was queued.
    Submitted(EmojifyResponse),
    /// The job service failed.
    SubmissionFailed,
}

impl Outcome {
    pub fn status(&self) -> StatusCode {
        match self {
            Outcome::Rejected(_) => StatusCode::BAD_REQUEST,
            Outcome::CacheHit => StatusCode::NOT_MODIFIED,
            Outcome::Submitted(_) => StatusCode::OK,
            Outcome::SubmissionFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Label used for the `emojify_outcomes_total` metric and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Rejected(_) => "rejected",
            Outcome::CacheHit => "cache_hit",
            Outcome::Submitted(_) => "submitted",
            Outcome::SubmissionFailed => "submission_failed",
        }
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Outcome::Rejected(err) => (
                status,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                format!("{err}\n"),
            )
                .into_response(),
            Outcome::CacheHit => status.into_response(),
            Outcome::Submitted(body) => (status, Json(body)).into_response(),
            Outcome::SubmissionFailed => (
                status,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                SUBMISSION_FAILED_BODY,
            )
                .into_response(),
        }
    }
}
