//! Composite liveness of the downstream services.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheClient, CacheError};
use crate::jobs::{JobClient, JobError};
use crate::validation::CacheKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OverallStatus {
    /// Every component is reachable.
    Ok,
    /// Some components are reachable.
    Degraded,
    /// No component is reachable.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub ok: bool,
    pub detail: String,
}

impl ComponentHealth {
    fn up(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: detail.into(),
        }
    }

    fn down(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub overall: OverallStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthStatus {
    pub fn from_components(components: BTreeMap<String, ComponentHealth>) -> Self {
        let up = components.values().filter(|c| c.ok).count();
        let overall = if up == components.len() {
            OverallStatus::Ok
        } else if up > 0 {
            OverallStatus::Degraded
        } else {
            OverallStatus::Fail
        };
        Self {
            overall,
            components,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.overall == OverallStatus::Ok
    }
}

impl IntoResponse for HealthStatus {
    fn into_response(self) -> Response {
        let status = if self.is_ok() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (status, Json(self)).into_response()
    }
}

/// Probes the cache and the job service on every call. Nothing is cached
/// between calls.
#[derive(Clone)]
pub struct HealthAggregator {
    cache: Arc<dyn CacheClient>,
    jobs: Arc<dyn JobClient>,
}

impl HealthAggregator {
    pub fn new(cache: Arc<dyn CacheClient>, jobs: Arc<dyn JobClient>) -> Self {
        Self { cache, jobs }
    }

    pub async fn check(&self) -> HealthStatus {
        let (cache, jobs) = tokio::join!(self.probe_cache(), self.probe_jobs());

        let components = BTreeMap::from([("cache".to_string(), cache), ("jobs".to_string(), jobs)]);
        let health = HealthStatus::from_components(components);
        if !health.is_ok() {
            tracing::warn!(overall = ?health.overall, "downstream dependency unreachable");
        }
        health
    }

    // A not-found answer still proves the cache is reachable; only
    // transport failures count as down.
    async fn probe_cache(&self) -> ComponentHealth {
        let backend = self.cache.backend_name();
        match self.cache.get(&CacheKey::health_probe()).await {
            Ok(_) | Err(CacheError::NotFound) => ComponentHealth::up(format!("{backend}: reachable")),
            Err(e @ CacheError::Backend { .. }) => ComponentHealth::up(format!("{backend}: {e}")),
            Err(e @ CacheError::Unavailable { .. }) => {
                ComponentHealth::down(format!("{backend}: {e}"))
            }
        }
    }

    async fn probe_jobs(&self) -> ComponentHealth {
        match self.jobs.probe().await {
            Ok(()) => ComponentHealth::up("reachable"),
            Err(e @ JobError::Unavailable { .. }) => ComponentHealth::down(e.to_string()),
            Err(e) => ComponentHealth::up(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components(states: &[(&str, bool)]) -> BTreeMap<String, ComponentHealth> {
        states
            .iter()
            .map(|(name, ok)| {
                let health = if *ok {
                    ComponentHealth::up("reachable")
                } else {
                    ComponentHealth::down("connection refused")
                };
                (name.to_string(), health)
            })
            .collect()
    }

    #[test]
    fn test_fold_overall_status() {
        let all = HealthStatus::from_components(components(&[("cache", true), ("jobs", true)]));
        assert_eq!(all.overall, OverallStatus::Ok);

        let some = HealthStatus::from_components(components(&[("cache", true), ("jobs", false)]));
        assert_eq!(some.overall, OverallStatus::Degraded);

        let none = HealthStatus::from_components(components(&[("cache", false), ("jobs", false)]));
        assert_eq!(none.overall, OverallStatus::Fail);
    }

    #[test]
    fn test_wire_format() {
        let health = HealthStatus::from_components(components(&[("cache", true)]));
        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["overall"], "OK");
        assert_eq!(json["components"]["cache"]["ok"], true);
    }

    #[test]
    fn test_response_status() {
        let ok = HealthStatus::from_components(components(&[("cache", true)]));
        assert_eq!(ok.into_response().status(), StatusCode::OK);

        let degraded = HealthStatus::from_components(components(&[("cache", true), ("jobs", false)]));
        assert_eq!(degraded.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
