//! # emojify-api
//!
//! HTTP gateway in front of the emojify workers.
//!
//! A client posts an image URL. The gateway validates it, asks the cache
//! whether the processed image already exists and, if not, queues a job and
//! returns the queue position.
//!
//! - [`validation`] - URL validation and cache key derivation
//! - [`cache`] - cache client contract and backends
//! - [`jobs`] - job service contract and clients
//! - [`gateway`] - the `POST /` orchestration
//! - [`health`] - composite downstream liveness
//! - [`server`] - router, middleware stack and startup

pub mod cache;
pub mod config;
pub mod gateway;
pub mod handlers;
pub mod health;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod validation;

pub use cache::{CacheClient, CacheError, FileCache, MemoryCache, RedisCache, RemoteCache};
pub use config::{AppConfig, CacheBackendKind, CacheConfig, JobsConfig, RedisConfig, ServerConfig};
pub use gateway::{EmojifyOrchestrator, EmojifyResponse, Outcome};
pub use health::{ComponentHealth, HealthAggregator, HealthStatus, OverallStatus};
pub use jobs::{JobClient, JobError, JobRecord, JobStatus, MemoryJobClient, RemoteJobClient};
pub use observability::init_tracing;
pub use server::{AppState, EmojifyServer, ServerBuilder, build_app, cors_layer};
pub use validation::{CacheKey, InvalidUrl, validate_url};
