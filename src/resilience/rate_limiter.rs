//! Inbound request limiting on top of `governor`.

use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, DefaultKeyedRateLimiter, NotUntil, Quota};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::RateLimitSettings;
use crate::error::{AppError, Result};
use crate::models::Platform;
use crate::observability::get_metrics;

type Instant = <DefaultClock as Clock>::Instant;

/// `max` requests per `window`, refilled evenly. `None` when `max` is zero,
/// which blocks the scope entirely.
fn window_quota(window_seconds: u64, max: u32) -> Option<Quota> {
    let max = NonZeroU32::new(max)?;
    let window = Duration::from_secs(window_seconds.max(1));
    Quota::with_period(window / max.get()).map(|q| q.allow_burst(max))
}

/// General per-client limit plus one limit per platform.
pub struct RateLimiter {
    enabled: bool,
    clients: Option<DefaultKeyedRateLimiter<String>>,
    platforms: HashMap<Platform, Option<DefaultDirectRateLimiter>>,
    clock: DefaultClock,
    rejected: AtomicU64,
}

impl RateLimiter {
    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        let clients = window_quota(settings.window_seconds, settings.max_requests)
            .map(governor::RateLimiter::keyed);
        let platforms = Platform::ALL
            .into_iter()
            .map(|p| {
                let quota = window_quota(settings.platform_window_seconds, settings.platform_limit(p));
                (p, quota.map(governor::RateLimiter::direct))
            })
            .collect();

        Self {
            enabled: settings.enabled,
            clients,
            platforms,
            clock: DefaultClock::default(),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn check_client(&self, client: &str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let outcome = match &self.clients {
            Some(limiter) => limiter.check_key(&client.to_string()).map_err(Some),
            None => Err(None),
        };

        outcome.map_err(|not_until| {
            self.reject("general", client, not_until);
            AppError::RateLimited("Too many requests, please try again later.".to_string())
        })
    }

    pub fn check_platform(&self, platform: Platform) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let outcome = match self.platforms.get(&platform) {
            Some(Some(limiter)) => limiter.check().map_err(Some),
            Some(None) => Err(None),
            None => Ok(()),
        };

        outcome.map_err(|not_until| {
            self.reject("platform", platform.as_str(), not_until);
            AppError::RateLimited(format!(
                "Rate limit exceeded for {}. Please try again later.",
                platform
            ))
        })
    }

    /// Number of clients currently tracked by the general limit.
    pub fn tracked_clients(&self) -> usize {
        self.clients.as_ref().map_or(0, |l| l.len())
    }

    /// Forgets clients whose budget has fully refilled. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let Some(limiter) = &self.clients else {
            return 0;
        };
        let before = limiter.len();
        limiter.retain_recent();
        limiter.shrink_to_fit();
        before.saturating_sub(limiter.len())
    }

    fn reject(&self, scope: &str, key: &str, not_until: Option<NotUntil<Instant>>) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        get_metrics().record_rate_limited(scope);
        let retry_after = not_until.map(|n| n.wait_time_from(self.clock.now()));
        tracing::warn!(
            scope = scope,
            key = key,
            retry_after_ms = retry_after.map(|d| d.as_millis() as u64),
            "Rate limit exceeded"
        );
    }
}
