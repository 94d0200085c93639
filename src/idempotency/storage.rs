use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::clock::Clock;

/// A cached response for one client-supplied key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyEntry {
    pub key: String,
    pub response: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl IdempotencyEntry {
    /// An entry is live for exactly `ttl` after creation.
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at > ttl
    }
}

/// In-memory response cache keyed by idempotency key.
///
/// Expiry is lazy: a read that finds an expired entry removes it. Entries
/// nobody reads again are dropped by [`IdempotencyCache::sweep_expired`].
pub struct IdempotencyCache {
    entries: RwLock<HashMap<String, IdempotencyEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl IdempotencyCache {
    pub fn new(ttl_seconds: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_seconds),
            clock,
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = self.clock.now();

        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired_at(now, self.ttl) => {
                    return Some(entry.response.clone());
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        // Another writer may have replaced the entry between the two locks.
        match entries.get(key) {
            Some(entry) if entry.is_expired_at(now, self.ttl) => {
                entries.remove(key);
                tracing::debug!(key = key, "Evicted expired idempotency entry");
                None
            }
            Some(entry) => Some(entry.response.clone()),
            None => None,
        }
    }

    pub async fn set(&self, key: &str, response: serde_json::Value) {
        let entry = IdempotencyEntry {
            key: key.to_string(),
            response,
            created_at: self.clock.now(),
        };
        self.entries.write().await.insert(key.to_string(), entry);
    }

    pub async fn has(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    pub async fn remove(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Removes every expired entry and returns how many were dropped.
    pub async fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now, self.ttl));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
