use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::clock::Clock;
use crate::config::IdempotencySettings;
use crate::error::{AppError, Result};
use crate::idempotency::storage::IdempotencyCache;
use crate::observability::get_metrics;

/// Metrics for idempotency handling.
#[derive(Debug, Default)]
pub struct IdempotencyMetrics {
    pub total_requests: AtomicU64,
    pub replayed_requests: AtomicU64,
    pub executed_requests: AtomicU64,
    pub coalesced_requests: AtomicU64,
    pub failed_requests: AtomicU64,
}

impl IdempotencyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replayed(&self) {
        self.replayed_requests.fetch_add(1, Ordering::Relaxed);
        get_metrics().record_idempotency_hit();
    }

    pub fn record_executed(&self) {
        self.executed_requests.fetch_add(1, Ordering::Relaxed);
        get_metrics().record_idempotency_miss();
    }

    /// A request that waited on another in-flight request with the same key.
    pub fn record_coalesced(&self) {
        self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            replayed_requests: self.replayed_requests.load(Ordering::Relaxed),
            executed_requests: self.executed_requests.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub replayed_requests: u64,
    pub executed_requests: u64,
    pub coalesced_requests: u64,
    pub failed_requests: u64,
}

impl MetricsSnapshot {
    pub fn replay_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.replayed_requests as f64 / self.total_requests as f64
        }
    }
}

/// Whether a keyed result was produced now or served from the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum IdempotentOutcome<T> {
    Fresh(T),
    Replayed(T),
}

impl<T> IdempotentOutcome<T> {
    pub fn is_replay(&self) -> bool {
        matches!(self, IdempotentOutcome::Replayed(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            IdempotentOutcome::Fresh(value) | IdempotentOutcome::Replayed(value) => value,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> IdempotentOutcome<U> {
        match self {
            IdempotentOutcome::Fresh(value) => IdempotentOutcome::Fresh(f(value)),
            IdempotentOutcome::Replayed(value) => IdempotentOutcome::Replayed(f(value)),
        }
    }
}

#[derive(Default)]
struct Gate {
    lock: Arc<AsyncMutex<()>>,
    /// Requests holding or queued on `lock`. Only touched under the map lock.
    holders: usize,
}

type GateMap = Mutex<HashMap<String, Gate>>;

/// Holds the per-key gate for one request and drops the map entry once no
/// other request is queued on it.
struct InFlight<'a> {
    gates: &'a GateMap,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut gates = self.gates.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(gate) = gates.get_mut(&self.key) {
            gate.holders = gate.holders.saturating_sub(1);
            if gate.holders == 0 {
                gates.remove(&self.key);
            }
        }
    }
}

/// Runs keyed operations at most once per live cache entry.
pub struct IdempotencyHandler {
    cache: IdempotencyCache,
    gates: GateMap,
    metrics: Arc<IdempotencyMetrics>,
}

impl IdempotencyHandler {
    pub fn new(ttl_seconds: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: IdempotencyCache::new(ttl_seconds, clock),
            gates: Mutex::new(HashMap::new()),
            metrics: Arc::new(IdempotencyMetrics::new()),
        }
    }

    pub fn from_settings(settings: &IdempotencySettings, clock: Arc<dyn Clock>) -> Self {
        Self::new(settings.ttl_seconds, clock)
    }

    /// Gets the metrics for this handler.
    pub fn metrics(&self) -> Arc<IdempotencyMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn cache(&self) -> &IdempotencyCache {
        &self.cache
    }

    pub async fn cached_entries(&self) -> usize {
        self.cache.len().await
    }

    /// Number of keys with a request currently executing or queued.
    pub fn in_flight(&self) -> usize {
        self.gates.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.cache.get(key).await {
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Failed to deserialize cached response: {}", e))
            }),
            None => Ok(None),
        }
    }

    async fn enter(&self, key: &str) -> InFlight<'_> {
        let lock = {
            let mut gates = self.gates.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let gate = gates.entry(key.to_string()).or_default();
            gate.holders += 1;
            if gate.holders > 1 {
                self.metrics.record_coalesced();
            }
            Arc::clone(&gate.lock)
        };

        // Built before waiting so a cancelled waiter still gives up its slot.
        let mut in_flight = InFlight {
            gates: &self.gates,
            key: key.to_string(),
            guard: None,
        };
        in_flight.guard = Some(lock.lock_owned().await);
        in_flight
    }

    /// Executes an operation with idempotency handling.
    ///
    /// Without a key the operation simply runs. With a key, a live cached
    /// result is replayed; otherwise concurrent callers sharing the key are
    /// serialized so only the first runs the operation. Failures are never
    /// cached, so the next caller in line runs it again.
    pub async fn execute<T, F, Fut>(
        &self,
        idempotency_key: Option<&str>,
        operation: F,
    ) -> Result<IdempotentOutcome<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(key) = idempotency_key else {
            return operation().await.map(IdempotentOutcome::Fresh);
        };

        self.metrics.record_request();

        if let Some(response) = self.cached(key).await? {
            self.metrics.record_replayed();
            tracing::info!(idempotency_key = key, "Returning cached response");
            return Ok(IdempotentOutcome::Replayed(response));
        }

        let _in_flight = self.enter(key).await;

        if let Some(response) = self.cached(key).await? {
            self.metrics.record_replayed();
            tracing::info!(idempotency_key = key, "Returning response cached by concurrent request");
            return Ok(IdempotentOutcome::Replayed(response));
        }

        self.metrics.record_executed();
        match operation().await {
            Ok(response) => {
                match serde_json::to_value(&response) {
                    Ok(value) => {
                        self.cache.set(key, value).await;
                        get_metrics().set_idempotency_entries(self.cache.len().await);
                    }
                    Err(e) => {
                        tracing::error!(idempotency_key = key, "Failed to cache response: {}", e);
                    }
                }
                Ok(IdempotentOutcome::Fresh(response))
            }
            Err(e) => {
                self.metrics.record_failed();
                tracing::debug!(idempotency_key = key, error = %e, "Operation failed, result not cached");
                Err(e)
            }
        }
    }

    /// Runs cleanup of expired idempotency entries.
    pub async fn cleanup_expired(&self) -> usize {
        let removed = self.cache.sweep_expired().await;
        get_metrics().set_idempotency_entries(self.cache.len().await);
        removed
    }
}

/// Background cleanup job for expired idempotency entries.
pub struct IdempotencyCleanupJob {
    handler: Arc<IdempotencyHandler>,
    interval_seconds: u64,
}

impl IdempotencyCleanupJob {
    pub fn new(handler: Arc<IdempotencyHandler>, interval_seconds: u64) -> Self {
        Self {
            handler,
            interval_seconds,
        }
    }

    /// Runs the cleanup job once.
    pub async fn run_once(&self) -> usize {
        self.handler.cleanup_expired().await
    }

    /// Starts the cleanup job in a background task.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(
                self.interval_seconds.max(1),
            ));

            loop {
                interval.tick().await;

                let count = self.handler.cleanup_expired().await;
                if count > 0 {
                    tracing::info!("Cleaned up {} expired idempotency entries", count);
                }
            }
        })
    }
}
