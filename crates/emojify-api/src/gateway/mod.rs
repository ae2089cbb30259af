//! Request orchestration for `POST /`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │  raw body    │
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐  invalid   ┌──────────────────┐
//! │  validate    ├───────────▶│ 400 Rejected     │
//! └──────┬───────┘            └──────────────────┘
//!        ▼
//! ┌──────────────┐  exists    ┌──────────────────┐
//! │ cache check  ├───────────▶│ 304 CacheHit     │
//! └──────┬───────┘            └──────────────────┘
//!        │ absent, or cache error (logged)
//!        ▼
//! ┌──────────────┐  ok        ┌──────────────────┐
//! │ job submit   ├───────────▶│ 200 Submitted    │
//! └──────┬───────┘            └──────────────────┘
//!        │ error (logged)
//!        ▼
//! ┌──────────────────┐
//! │ 500 SubmitFailed │
//! └──────────────────┘
//! ```
//!
//! Each downstream call happens at most once per request and is never
//! retried. Timeouts belong to the transport clients.

mod orchestrator;
mod outcome;

pub use orchestrator::EmojifyOrchestrator;
pub use outcome::{EmojifyResponse, Outcome, SUBMISSION_FAILED_BODY};
