use emojify_auth::AuthConfig;
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Cache backend selection and location
    #[serde(default)]
    pub cache: CacheConfig,
    /// Job service location
    #[serde(default)]
    pub jobs: JobsConfig,
    /// Bearer token verification
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.allowed_origin.trim().is_empty() {
            return Err("server.allowed_origin must not be empty".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Cache validation, only the selected backend has to be usable
        match self.cache.backend {
            CacheBackendKind::Remote => {
                if self.cache.remote.url.trim().is_empty() {
                    return Err("cache.remote.url must be set for the remote backend".into());
                }
                if self.cache.remote.timeout_ms == 0 {
                    return Err("cache.remote.timeout_ms must be > 0".into());
                }
            }
            CacheBackendKind::Redis => {
                if self.cache.redis.url.trim().is_empty() {
                    return Err("cache.redis.url must be set for the redis backend".into());
                }
                if self.cache.redis.pool_size == 0 {
                    return Err("cache.redis.pool_size must be > 0".into());
                }
                if self.cache.redis.timeout_ms == 0 {
                    return Err("cache.redis.timeout_ms must be > 0".into());
                }
            }
            CacheBackendKind::File => {
                if self.cache.file.path.trim().is_empty() {
                    return Err("cache.file.path must be set for the file backend".into());
                }
            }
            CacheBackendKind::Memory => {}
        }
        // Jobs validation
        if self.jobs.url.trim().is_empty() {
            return Err("jobs.url must be set".into());
        }
        if self.jobs.timeout_ms == 0 {
            return Err("jobs.timeout_ms must be > 0".into());
        }
        // Auth validation
        if self.auth.enabled {
            self.auth
                .validate()
                .map_err(|e| format!("auth config error: {e}"))?;
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Single origin allowed by the CORS layer ("*" for any)
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    9090
}
fn default_allowed_origin() -> String {
    "*".into()
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origin: default_allowed_origin(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Which cache implementation the gateway talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// Remote cache service over HTTP
    #[default]
    Remote,
    /// Redis keys written by the emojify workers
    Redis,
    /// Directory of artifacts named by cache key
    File,
    /// In-process map, for local development
    Memory,
}

impl std::fmt::Display for CacheBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackendKind::Remote => write!(f, "remote"),
            CacheBackendKind::Redis => write!(f, "redis"),
            CacheBackendKind::File => write!(f, "file"),
            CacheBackendKind::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackendKind,
    #[serde(default)]
    pub remote: RemoteCacheConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub file: FileCacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCacheConfig {
    /// Base URL of the cache service (e.g., "http://localhost:9091")
    #[serde(default = "default_remote_cache_url")]
    pub url: String,

    /// Round-trip timeout for a single call in milliseconds
    #[serde(default = "default_downstream_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_remote_cache_url() -> String {
    "http://localhost:9091".into()
}

fn default_downstream_timeout_ms() -> u64 {
    3000
}

impl RemoteCacheConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RemoteCacheConfig {
    fn default() -> Self {
        Self {
            url: default_remote_cache_url(),
            timeout_ms: default_downstream_timeout_ms(),
        }
    }
}

/// Redis configuration for the redis cache backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Optional password, applied when the URL carries none
    #[serde(default)]
    pub password: Option<String>,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_downstream_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

impl RedisConfig {
    /// Connection URL with the configured password applied.
    pub fn connection_url(&self) -> String {
        match self.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => match url::Url::parse(&self.url) {
                Ok(mut parsed) if parsed.password().is_none() => {
                    if parsed.set_password(Some(password)).is_ok() {
                        parsed.to_string()
                    } else {
                        self.url.clone()
                    }
                }
                _ => self.url.clone(),
            },
            None => self.url.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            password: None,
            pool_size: default_redis_pool_size(),
            timeout_ms: default_downstream_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCacheConfig {
    #[serde(default = "default_file_cache_path")]
    pub path: String,
}

fn default_file_cache_path() -> String {
    "./cache/".into()
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        Self {
            path: default_file_cache_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Base URL of the emojify job service
    #[serde(default = "default_jobs_url")]
    pub url: String,

    /// Round-trip timeout for a single call in milliseconds
    #[serde(default = "default_downstream_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_jobs_url() -> String {
    "http://localhost:9092".into()
}

impl JobsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            url: default_jobs_url(),
            timeout_ms: default_downstream_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_FILE: &str = "emojify.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., EMOJIFY__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("EMOJIFY")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.server.allowed_origin, "*");
        assert_eq!(cfg.cache.backend, CacheBackendKind::Remote);
        assert_eq!(cfg.jobs.timeout(), Duration::from_millis(3000));
        assert_eq!(cfg.addr().to_string(), "0.0.0.0:9090");
    }

    #[test]
    fn test_parse_toml() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [server]
            port = 8088
            allowed_origin = "https://emojify.today"

            [cache]
            backend = "redis"

            [cache.redis]
            url = "redis://cache:6379"
            password = "s3cret"

            [jobs]
            url = "http://emojify:9090"
            timeout_ms = 1500

            [auth]
            issuer = "https://auth.emojify.today"
            audience = "emojify-api"
            "#,
        )
        .unwrap();

        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.server.port, 8088);
        assert_eq!(cfg.cache.backend, CacheBackendKind::Redis);
        assert_eq!(cfg.cache.redis.connection_url(), "redis://:s3cret@cache:6379");
        assert_eq!(cfg.jobs.timeout(), Duration::from_millis(1500));
        assert_eq!(cfg.auth.audience, "emojify-api");
        // unspecified sections keep their defaults
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.cache.file.path, "./cache/");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = AppConfig::default();
        cfg.server.port = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.jobs.timeout_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.cache.backend = CacheBackendKind::File;
        cfg.cache.file.path = String::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_unselected_backend_not_validated() {
        let mut cfg = AppConfig::default();
        cfg.cache.backend = CacheBackendKind::Memory;
        cfg.cache.remote.url = String::new();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_auth_disabled_skips_auth_validation() {
        let mut cfg = AppConfig::default();
        cfg.auth.audience = String::new();
        assert!(cfg.validate().is_err());

        cfg.auth.enabled = false;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_redis_password_not_applied_twice() {
        let redis = RedisConfig {
            url: "redis://:other@cache:6379".into(),
            password: Some("s3cret".into()),
            ..RedisConfig::default()
        };
        assert_eq!(redis.connection_url(), "redis://:other@cache:6379");
    }
}
