use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use super::{handlers, middleware as mw};
use crate::clock::{system_clock, Clock};
use crate::config::Settings;
use crate::error::Result;
use crate::idempotency::{IdempotencyCleanupJob, IdempotencyHandler};
use crate::observability::{logging, HealthChecker};
use crate::resilience::{FaultInjector, RandomFaults, RateLimiter};
use crate::services::{AdCopyService, CopyGenerator, OpenAiCopyGenerator, PlatformGateway};
use crate::tokens::TokenLifecycleManager;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub clock: Arc<dyn Clock>,
    pub tokens: Arc<TokenLifecycleManager>,
    pub idempotency: Arc<IdempotencyHandler>,
    pub gateway: Arc<PlatformGateway>,
    pub ad_copy: Arc<AdCopyService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub health_checker: Arc<HealthChecker>,
    pub metrics_handle: Option<PrometheusHandle>,
    background_jobs: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl AppState {
    /// Builds production state: system clock, random faults at the configured
    /// rate, and the OpenAI copy generator.
    pub fn new(settings: Settings) -> Result<Self> {
        let generator = Arc::new(OpenAiCopyGenerator::new(settings.openai.clone())?);
        let faults = Arc::new(RandomFaults::new(settings.simulation.failure_rate));
        Ok(Self::from_parts(settings, system_clock(), faults, generator))
    }

    /// Builds state from explicit collaborators. Each call gets its own stores.
    pub fn from_parts(
        settings: Settings,
        clock: Arc<dyn Clock>,
        faults: Arc<dyn FaultInjector>,
        copy_generator: Arc<dyn CopyGenerator>,
    ) -> Self {
        let tokens = Arc::new(TokenLifecycleManager::from_settings(
            &settings.tokens,
            Arc::clone(&clock),
        ));
        let idempotency = Arc::new(IdempotencyHandler::from_settings(
            &settings.idempotency,
            Arc::clone(&clock),
        ));
        let gateway = Arc::new(PlatformGateway::new(
            &settings,
            Arc::clone(&idempotency),
            faults,
            Arc::clone(&clock),
        ));
        let copy_configured = copy_generator.is_configured();
        let ad_copy = Arc::new(AdCopyService::new(copy_generator, &settings.retry.ad_copy));
        let rate_limiter = Arc::new(RateLimiter::from_settings(&settings.rate_limit));
        let health_checker = Arc::new(HealthChecker::new(
            Arc::clone(&tokens),
            Arc::clone(&idempotency),
            copy_configured,
        ));

        Self {
            settings: Arc::new(settings),
            clock,
            tokens,
            idempotency,
            gateway,
            ad_copy,
            rate_limiter,
            health_checker,
            metrics_handle: None,
            background_jobs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Adds metrics handle to the state.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Starts the idempotency sweep on the configured interval.
    pub fn start_background_jobs(&self) {
        let job = IdempotencyCleanupJob::new(
            Arc::clone(&self.idempotency),
            self.settings.idempotency.sweep_interval_seconds,
        );
        self.jobs().push(job.start());
        tracing::info!(
            interval_seconds = self.settings.idempotency.sweep_interval_seconds,
            "Started idempotency sweep"
        );

        if self.rate_limiter.is_enabled() {
            let limiter = Arc::clone(&self.rate_limiter);
            let every = Duration::from_secs(self.settings.rate_limit.platform_window_seconds.max(1));
            self.jobs().push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(every);
                loop {
                    interval.tick().await;
                    let pruned = limiter.prune();
                    if pruned > 0 {
                        tracing::debug!(pruned = pruned, "Pruned idle rate limit clients");
                    }
                }
            }));
        }
    }

    /// Stops background jobs. Stores are dropped with the last state clone.
    pub fn shutdown(&self) {
        let jobs: Vec<_> = self.jobs().drain(..).collect();
        for job in &jobs {
            job.abort();
        }
        tracing::info!(stopped_jobs = jobs.len(), "Application state shut down");
    }

    pub fn background_job_count(&self) -> usize {
        self.jobs().len()
    }

    fn jobs(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.background_jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Creates the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    let platform_routes = Router::new()
        .route("/create-campaign", post(handlers::create_campaign))
        .route("/batch-create-ads", post(handlers::batch_create_ads))
        .route("/fetch-analytics", get(handlers::fetch_analytics))
        .route("/generate-ad-copy", post(handlers::generate_ad_copy))
        .route_layer(middleware::from_fn_with_state(state.clone(), mw::require_token));

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/detailed", get(handlers::detailed_health_check))
        // Metrics endpoint
        .route("/metrics", get(handlers::metrics_endpoint))
        // Account endpoints
        .route("/connect-account", post(handlers::connect_account))
        .route("/refresh-token", post(handlers::refresh_token))
        .route("/token-info", get(handlers::token_info))
        .merge(platform_routes)
        .route_layer(middleware::from_fn(mw::track_http_metrics))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), mw::rate_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<Body>| logging::http_span(req)),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
