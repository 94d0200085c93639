use serde::Deserialize;
use std::time::Duration;

use crate::models::Platform;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub tokens: TokenSettings,
    pub idempotency: IdempotencySettings,
    pub simulation: SimulationSettings,
    pub retry: RetrySettings,
    pub rate_limit: RateLimitSettings,
    pub auth: AuthSettings,
    pub openai: OpenAiSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: String,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    pub lifetime_seconds: i64,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            lifetime_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdempotencySettings {
    pub ttl_seconds: i64,
    pub sweep_interval_seconds: u64,
}

impl Default for IdempotencySettings {
    fn default() -> Self {
        Self {
            ttl_seconds: 86_400,
            sweep_interval_seconds: 300,
        }
    }
}

/// Artificial latency and fault rate of the simulated platforms.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub connect_delay_ms: u64,
    pub campaign_delay_ms: u64,
    pub ads_delay_ms: u64,
    pub analytics_delay_ms: u64,
    pub failure_rate: f64,
}

impl SimulationSettings {
    /// No latency and no injected faults.
    pub fn instant() -> Self {
        Self {
            connect_delay_ms: 0,
            campaign_delay_ms: 0,
            ads_delay_ms: 0,
            analytics_delay_ms: 0,
            failure_rate: 0.0,
        }
    }

    pub fn connect_delay(&self) -> Duration {
        Duration::from_millis(self.connect_delay_ms)
    }

    pub fn campaign_delay(&self) -> Duration {
        Duration::from_millis(self.campaign_delay_ms)
    }

    pub fn ads_delay(&self) -> Duration {
        Duration::from_millis(self.ads_delay_ms)
    }

    pub fn analytics_delay(&self) -> Duration {
        Duration::from_millis(self.analytics_delay_ms)
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            connect_delay_ms: 100,
            campaign_delay_ms: 100,
            ads_delay_ms: 200,
            analytics_delay_ms: 50,
            failure_rate: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BackoffSettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl BackoffSettings {
    pub const fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms: 10_000,
        }
    }
}

/// Retry budgets per downstream operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub campaign: BackoffSettings,
    pub ads: BackoffSettings,
    pub ad_copy: BackoffSettings,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            campaign: BackoffSettings::new(3, 1000),
            ads: BackoffSettings::new(2, 1500),
            ad_copy: BackoffSettings::new(3, 2000),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub window_seconds: u64,
    pub max_requests: u32,
    pub platform_window_seconds: u64,
    pub meta_max_requests: u32,
    pub google_max_requests: u32,
    pub tiktok_max_requests: u32,
}

impl RateLimitSettings {
    pub fn platform_limit(&self, platform: Platform) -> u32 {
        match platform {
            Platform::Meta => self.meta_max_requests,
            Platform::Google => self.google_max_requests,
            Platform::Tiktok => self.tiktok_max_requests,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            window_seconds: 15 * 60,
            max_requests: 100,
            platform_window_seconds: 60,
            meta_max_requests: 20,
            google_max_requests: 15,
            tiktok_max_requests: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Require a bearer token on platform endpoints.
    pub require_token: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.8,
            max_tokens: 800,
            timeout_seconds: 30,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let mut settings: Settings = builder.build()?.try_deserialize()?;

        if settings.openai.api_key.is_none() {
            settings.openai.api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty());
        }

        Ok(settings)
    }

    /// Settings for tests: no artificial latency, no random faults, no rate limiting.
    pub fn for_tests() -> Self {
        Self {
            simulation: SimulationSettings::instant(),
            rate_limit: RateLimitSettings {
                enabled: false,
                ..RateLimitSettings::default()
            },
            ..Self::default()
        }
    }
}
