use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use emojify_auth::{AuthState, RemoteTokenVerifier, TokenVerifier, require_bearer};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::cache::{CacheClient, create_cache_client};
use crate::config::AppConfig;
use crate::gateway::EmojifyOrchestrator;
use crate::health::HealthAggregator;
use crate::jobs::{JobClient, RemoteJobClient};
use crate::middleware::{RequestId, http_metrics, request_id};
use crate::{handlers, metrics};

/// Shared handler state. Cloned per request; everything inside is `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: EmojifyOrchestrator,
    pub health: HealthAggregator,
    pub cache: Arc<dyn CacheClient>,
    pub metrics_enabled: bool,
}

impl AppState {
    pub fn new(cache: Arc<dyn CacheClient>, jobs: Arc<dyn JobClient>) -> Self {
        Self {
            orchestrator: EmojifyOrchestrator::new(cache.clone(), jobs.clone()),
            health: HealthAggregator::new(cache.clone(), jobs),
            cache,
            metrics_enabled: false,
        }
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }
}

pub struct EmojifyServer {
    addr: SocketAddr,
    app: Router,
}

/// Builds the router. `POST /` sits behind the bearer gate when `auth` is
/// given; `/health`, `/cache` and `/metrics` are never gated.
pub fn build_app(cfg: &AppConfig, state: AppState, auth: Option<AuthState>) -> Router {
    let body_limit = cfg.server.body_limit_bytes;

    let mut emojify = Router::new().route("/", post(handlers::emojify));
    if let Some(auth) = auth {
        emojify = emojify.route_layer(middleware::from_fn_with_state(auth, require_bearer));
    }

    Router::new()
        .merge(emojify)
        .route("/health", get(handlers::health))
        .route("/cache", get(handlers::cached_artifact))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        // Middleware stack (outermost last: request id -> trace -> cors -> metrics -> body limit)
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(http_metrics))
        .layer(cors_layer(&cfg.server.allowed_origin))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<RequestId>()
                        .map(|id| id.as_str().to_string())
                        .unwrap_or_default();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                        span.record("http.status_code", tracing::field::display(res.status().as_u16()));
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(request_id))
}

/// CORS for a single allowed origin, with credentials and the
/// `Authorization` header allowed.
///
/// `"*"` mirrors the request origin; a literal wildcard cannot be combined
/// with credentials.
pub fn cors_layer(allowed_origin: &str) -> CorsLayer {
    let origin = match allowed_origin.trim() {
        "*" => AllowOrigin::mirror_request(),
        origin => match HeaderValue::from_str(origin) {
            Ok(value) => AllowOrigin::list([value]),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Invalid CORS origin, no origin will be allowed");
                AllowOrigin::list(Vec::<HeaderValue>::new())
            }
        },
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Assembles the server from configuration. Clients and verifier can be
/// injected; whatever is not injected is built from the config.
pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    cache: Option<Arc<dyn CacheClient>>,
    jobs: Option<Arc<dyn JobClient>>,
    verifier: Option<Arc<dyn TokenVerifier>>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            cache: None,
            jobs: None,
            verifier: None,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheClient>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_jobs(mut self, jobs: Arc<dyn JobClient>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub async fn build(self) -> anyhow::Result<EmojifyServer> {
        let cfg = self.config;

        let cache = match self.cache {
            Some(cache) => cache,
            None => create_cache_client(&cfg.cache)
                .await
                .context("failed to create cache client")?,
        };

        let jobs: Arc<dyn JobClient> = match self.jobs {
            Some(jobs) => jobs,
            None => {
                tracing::info!(url = %cfg.jobs.url, "Creating job service client");
                Arc::new(
                    RemoteJobClient::new(&cfg.jobs.url, cfg.jobs.timeout())
                        .context("failed to create job service client")?,
                )
            }
        };

        let auth = if cfg.auth.enabled {
            let verifier: Arc<dyn TokenVerifier> = match self.verifier {
                Some(verifier) => verifier,
                None => {
                    let verifier = RemoteTokenVerifier::from_config(&cfg.auth)
                        .context("failed to create token verifier")?;
                    tracing::info!(
                        issuer = %verifier.issuer(),
                        audience = %cfg.auth.audience,
                        "Bearer token verification enabled"
                    );
                    Arc::new(verifier)
                }
            };
            Some(AuthState::new(verifier))
        } else {
            tracing::warn!("Authentication disabled, POST / accepts unauthenticated requests");
            None
        };

        if cfg.metrics.enabled {
            metrics::init_metrics();
        }

        let state = AppState::new(cache, jobs).with_metrics(cfg.metrics.enabled);
        let app = build_app(&cfg, state, auth);

        Ok(EmojifyServer {
            addr: self.addr,
            app,
        })
    }
}

impl EmojifyServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn into_router(self) -> Router {
        self.app
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("failed to bind {}", self.addr))?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
