use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::metrics::LatencyTimer;
use crate::idempotency::IdempotencyHandler;
use crate::tokens::TokenLifecycleManager;

/// Ordered from best to worst so the aggregate is the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DependencyHealth {
    fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            latency_ms: None,
            message: None,
        }
    }

    pub fn healthy(name: impl Into<String>, latency_ms: f64) -> Self {
        Self {
            latency_ms: Some(latency_ms),
            ..Self::new(name, HealthStatus::Healthy)
        }
    }

    pub fn degraded(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, HealthStatus::Degraded).with_message(message)
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, HealthStatus::Unhealthy).with_message(message)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Body of `/health/detailed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedHealth {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: Vec<DependencyHealth>,
}

impl AggregatedHealth {
    pub fn new(version: String, uptime_seconds: u64, dependencies: Vec<DependencyHealth>) -> Self {
        let status = dependencies
            .iter()
            .map(|d| d.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);

        Self {
            status,
            version,
            uptime_seconds,
            dependencies,
        }
    }
}

/// Health checker for the in-process components.
pub struct HealthChecker {
    tokens: Arc<TokenLifecycleManager>,
    idempotency: Arc<IdempotencyHandler>,
    copy_generator_configured: bool,
    start_time: std::time::Instant,
}

impl HealthChecker {
    pub fn new(
        tokens: Arc<TokenLifecycleManager>,
        idempotency: Arc<IdempotencyHandler>,
        copy_generator_configured: bool,
    ) -> Self {
        Self {
            tokens,
            idempotency,
            copy_generator_configured,
            start_time: std::time::Instant::now(),
        }
    }

    /// Performs a full health check of all components.
    pub async fn check_all(&self) -> AggregatedHealth {
        let dependencies = vec![
            self.check_token_store().await,
            self.check_idempotency_cache().await,
            self.check_copy_generator(),
        ];

        AggregatedHealth::new(
            env!("CARGO_PKG_VERSION").to_string(),
            self.uptime_seconds(),
            dependencies,
        )
    }

    pub async fn check_token_store(&self) -> DependencyHealth {
        let timer = LatencyTimer::new();
        let live = self.tokens.len().await;
        DependencyHealth::healthy("token_store", timer.elapsed_ms())
            .with_message(format!("{} live token pairs", live))
    }

    pub async fn check_idempotency_cache(&self) -> DependencyHealth {
        let timer = LatencyTimer::new();
        let entries = self.idempotency.cached_entries().await;
        let in_flight = self.idempotency.in_flight();
        DependencyHealth::healthy("idempotency_cache", timer.elapsed_ms())
            .with_message(format!("{} cached, {} in flight", entries, in_flight))
    }

    /// Ad copy falls back to an error response without an API key, so a
    /// missing key degrades rather than fails the service.
    pub fn check_copy_generator(&self) -> DependencyHealth {
        if self.copy_generator_configured {
            DependencyHealth::healthy("ad_copy_generator", 0.0)
        } else {
            DependencyHealth::degraded("ad_copy_generator", "OpenAI API key not configured")
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ordering() {
        assert!(HealthStatus::Healthy < HealthStatus::Degraded);
        assert!(HealthStatus::Degraded < HealthStatus::Unhealthy);
    }

    #[test]
    fn test_no_dependencies_is_healthy() {
        let health = AggregatedHealth::new("1.0.0".to_string(), 0, Vec::new());
        assert_eq!(health.status, HealthStatus::Healthy);
    }

    #[test]
    fn test_healthy_dependency_omits_message() {
        let json = serde_json::to_value(DependencyHealth::healthy("token_store", 1.5)).unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json.get("message").is_none());

        let json = serde_json::to_value(DependencyHealth::degraded("ad_copy_generator", "no key"))
            .unwrap();
        assert!(json.get("latency_ms").is_none());
        assert_eq!(json["message"], "no key");
    }

    #[tokio::test]
    async fn test_checker_degrades_without_copy_generator() {
        use crate::clock::MockClock;
        use crate::models::Platform;

        let clock = Arc::new(MockClock::default());
        let tokens = Arc::new(TokenLifecycleManager::new(120, clock.clone()));
        let idempotency = Arc::new(IdempotencyHandler::new(86_400, clock));
        tokens.issue(Platform::Meta, "acc").await;

        let checker = HealthChecker::new(tokens, idempotency, false);
        let health = checker.check_all().await;

        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.dependencies.len(), 3);
        assert_eq!(
            health.dependencies[0].message.as_deref(),
            Some("1 live token pairs")
        );
    }
}
