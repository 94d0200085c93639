use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Global metrics instance.
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Metrics collector for the gateway. Every method is a no-op until a
/// recorder is installed with [`init_metrics`].
#[derive(Debug, Clone)]
pub struct Metrics {
    initialized: bool,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self { initialized: true }
    }

    pub fn record_token_issued(&self, platform: &str) {
        counter!("gateway_tokens_issued_total", "platform" => platform.to_string()).increment(1);
    }

    pub fn record_token_refreshed(&self, platform: &str) {
        counter!("gateway_tokens_refreshed_total", "platform" => platform.to_string()).increment(1);
    }

    pub fn record_token_rejected(&self, reason: &str) {
        counter!("gateway_tokens_rejected_total", "reason" => reason.to_string()).increment(1);
    }

    pub fn record_campaign_created(&self, platform: &str) {
        counter!("gateway_campaigns_created_total", "platform" => platform.to_string()).increment(1);
    }

    pub fn record_ads_created(&self, platform: &str, count: u64) {
        counter!("gateway_ads_created_total", "platform" => platform.to_string()).increment(count);
        histogram!("gateway_ad_batch_size").record(count as f64);
    }

    pub fn record_simulated_call(&self, operation: &str, failed: bool, duration_ms: f64) {
        counter!(
            "gateway_platform_calls_total",
            "operation" => operation.to_string(),
            "failed" => failed.to_string()
        )
        .increment(1);
        histogram!("gateway_platform_call_duration_ms", "operation" => operation.to_string())
            .record(duration_ms);
    }

    pub fn record_retry(&self, operation: &str) {
        counter!("gateway_retries_total", "operation" => operation.to_string()).increment(1);
    }

    pub fn record_retry_exhausted(&self, operation: &str) {
        counter!("gateway_retries_exhausted_total", "operation" => operation.to_string()).increment(1);
    }

    pub fn record_idempotency_hit(&self) {
        counter!("gateway_idempotency_hits_total").increment(1);
    }

    pub fn record_idempotency_miss(&self) {
        counter!("gateway_idempotency_misses_total").increment(1);
    }

    pub fn set_idempotency_entries(&self, count: usize) {
        gauge!("gateway_idempotency_entries").set(count as f64);
    }

    pub fn record_rate_limited(&self, scope: &str) {
        counter!("gateway_rate_limited_total", "scope" => scope.to_string()).increment(1);
    }

    pub fn record_ad_copy_generated(&self, source: &str) {
        counter!("gateway_ad_copy_generated_total", "source" => source.to_string()).increment(1);
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_ms: f64) {
        counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string(), "status" => status.to_string()).increment(1);
        histogram!("http_request_duration_ms", "method" => method.to_string(), "path" => path.to_string()).record(duration_ms);
    }
}

/// Timer for measuring operation latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for LatencyTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the Prometheus recorder once and returns its render handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();

    let handle = METRICS_HANDLE.get_or_init(|| handle).clone();
    METRICS.get_or_init(Metrics::new);

    Ok(handle)
}

/// Returns the handle installed by [`init_metrics`], if any.
pub fn prometheus_handle() -> Option<PrometheusHandle> {
    METRICS_HANDLE.get().cloned()
}

fn describe_metrics() {
    describe_counter!("gateway_tokens_issued_total", Unit::Count, "Token pairs issued by connect-account");
    describe_counter!("gateway_tokens_refreshed_total", Unit::Count, "Token pairs rotated by refresh");
    describe_counter!("gateway_tokens_rejected_total", Unit::Count, "Missing, expired or unknown tokens");

    describe_counter!("gateway_campaigns_created_total", Unit::Count, "Campaigns created");
    describe_counter!("gateway_ads_created_total", Unit::Count, "Ads created through batch requests");
    describe_histogram!("gateway_ad_batch_size", Unit::Count, "Ads per batch request");

    describe_counter!("gateway_platform_calls_total", Unit::Count, "Simulated platform calls");
    describe_histogram!("gateway_platform_call_duration_ms", Unit::Milliseconds, "Simulated platform call latency");

    describe_counter!("gateway_retries_total", Unit::Count, "Retry attempts after a transient failure");
    describe_counter!("gateway_retries_exhausted_total", Unit::Count, "Operations that failed after all retries");

    describe_counter!("gateway_idempotency_hits_total", Unit::Count, "Requests answered from the idempotency cache");
    describe_counter!("gateway_idempotency_misses_total", Unit::Count, "Keyed requests that ran the operation");
    describe_gauge!("gateway_idempotency_entries", Unit::Count, "Cached idempotent responses");

    describe_counter!("gateway_rate_limited_total", Unit::Count, "Requests rejected by rate limiting");
    describe_counter!("gateway_ad_copy_generated_total", Unit::Count, "Ad copy generation results");

    describe_counter!("http_requests_total", Unit::Count, "Total HTTP requests");
    describe_histogram!("http_request_duration_ms", Unit::Milliseconds, "HTTP request latency in milliseconds");
}

/// Returns the global metrics instance.
pub fn get_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_timer() {
        let timer = LatencyTimer::new();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let elapsed = timer.elapsed_ms();
        assert!(elapsed >= 10.0);
    }

    #[test]
    fn test_metrics_without_recorder_are_noops() {
        let metrics = get_metrics();
        assert!(metrics.initialized);
        metrics.record_retry("create_campaign");
        metrics.record_ads_created("meta", 3);
    }
}
