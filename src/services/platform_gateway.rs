use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::config::{SimulationSettings, Settings};
use crate::error::{AppError, Result};
use crate::idempotency::{IdempotencyHandler, IdempotentOutcome};
use crate::models::{
    Ad, AdCreated, AdDraft, AnalyticsReport, Campaign, CampaignCreated, NewCampaign, Platform,
};
use crate::observability::{get_metrics, LatencyTimer};
use crate::resilience::{FaultInjector, RandomFaults, RetryExecutor, RetryPolicy};

const UNAVAILABLE_MESSAGE: &str = "Platform temporarily unavailable";

/// Ads to attach to an existing campaign in one call.
#[derive(Debug, Clone)]
pub struct NewAdBatch {
    pub platform: Platform,
    pub account_id: String,
    pub campaign_id: String,
    pub ads: Vec<AdDraft>,
    pub batch_id: String,
}

/// Simulated ad platform backend with retry and idempotent replay.
pub struct PlatformGateway {
    campaigns: RwLock<HashMap<String, Campaign>>,
    ads: RwLock<HashMap<String, Vec<Ad>>>,
    retry: RetryExecutor,
    faults: Arc<dyn FaultInjector>,
    simulation: SimulationSettings,
    campaign_policy: RetryPolicy,
    ads_policy: RetryPolicy,
    idempotency: Arc<IdempotencyHandler>,
    clock: Arc<dyn Clock>,
}

impl PlatformGateway {
    pub fn new(
        settings: &Settings,
        idempotency: Arc<IdempotencyHandler>,
        faults: Arc<dyn FaultInjector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            campaigns: RwLock::new(HashMap::new()),
            ads: RwLock::new(HashMap::new()),
            retry: RetryExecutor::new(),
            faults,
            simulation: settings.simulation.clone(),
            campaign_policy: RetryPolicy::from(&settings.retry.campaign),
            ads_policy: RetryPolicy::from(&settings.retry.ads),
            idempotency,
            clock,
        }
    }

    /// Gateway whose faults follow the configured failure rate.
    pub fn from_settings(
        settings: &Settings,
        idempotency: Arc<IdempotencyHandler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let faults = Arc::new(RandomFaults::new(settings.simulation.failure_rate));
        Self::new(settings, idempotency, faults, clock)
    }

    pub fn with_retry_executor(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_executor(&self) -> &RetryExecutor {
        &self.retry
    }

    /// One round trip to the platform: latency, then maybe a transient fault.
    async fn simulate_call(&self, operation: &str, delay: Duration) -> Result<()> {
        let timer = LatencyTimer::new();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failed = self.faults.should_fail(operation);
        get_metrics().record_simulated_call(operation, failed, timer.elapsed_ms());

        if failed {
            tracing::warn!(operation = operation, "Simulated platform failure");
            return Err(AppError::service_unavailable(UNAVAILABLE_MESSAGE));
        }
        Ok(())
    }

    /// Simulates the OAuth handshake preceding token issuance.
    pub async fn authorize_account(&self, platform: Platform, account_id: &str) {
        let delay = self.simulation.connect_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        tracing::debug!(platform = %platform, account_id = account_id, "Account authorized");
    }

    pub async fn create_campaign(
        &self,
        request: NewCampaign,
        idempotency_key: Option<&str>,
    ) -> Result<IdempotentOutcome<CampaignCreated>> {
        let key = idempotency_key.map(|k| format!("campaign:{}", k));

        let outcome = self
            .idempotency
            .execute(key.as_deref(), || {
                self.retry.execute("create_campaign", &self.campaign_policy, || {
                    self.create_campaign_once(&request)
                })
            })
            .await?;

        if let IdempotentOutcome::Fresh(created) = &outcome {
            get_metrics().record_campaign_created(request.platform.as_str());
            tracing::info!(
                platform = %request.platform,
                campaign_id = %created.campaign_id,
                "Created campaign"
            );
        }

        Ok(outcome)
    }

    async fn create_campaign_once(&self, request: &NewCampaign) -> Result<CampaignCreated> {
        self.simulate_call("create_campaign", self.simulation.campaign_delay())
            .await?;

        let campaign = Campaign::new(request.clone(), self.clock.now());
        let created = CampaignCreated::from(&campaign);
        self.campaigns
            .write()
            .await
            .insert(campaign.id.clone(), campaign);

        Ok(created)
    }

    /// Creates one ad per draft, in input order. The campaign must already
    /// exist; an unknown campaign fails before any platform call is made.
    pub async fn batch_create_ads(
        &self,
        batch: NewAdBatch,
    ) -> Result<IdempotentOutcome<Vec<AdCreated>>> {
        if !self.campaigns.read().await.contains_key(&batch.campaign_id) {
            tracing::warn!(campaign_id = %batch.campaign_id, "Campaign not found");
            return Err(AppError::campaign_not_found(&batch.campaign_id));
        }

        let key = format!("ads:{}", batch.batch_id);

        let outcome = self
            .idempotency
            .execute(Some(&key), || {
                self.retry.execute("batch_create_ads", &self.ads_policy, || {
                    self.create_ads_once(&batch)
                })
            })
            .await?;

        if let IdempotentOutcome::Fresh(created) = &outcome {
            get_metrics().record_ads_created(batch.platform.as_str(), created.len() as u64);
            tracing::info!(
                platform = %batch.platform,
                campaign_id = %batch.campaign_id,
                batch_id = %batch.batch_id,
                count = created.len(),
                "Created ads"
            );
        }

        Ok(outcome)
    }

    async fn create_ads_once(&self, batch: &NewAdBatch) -> Result<Vec<AdCreated>> {
        self.simulate_call("batch_create_ads", self.simulation.ads_delay())
            .await?;

        let now = self.clock.now();
        let ads: Vec<Ad> = batch
            .ads
            .iter()
            .map(|draft| {
                Ad::new(
                    draft,
                    &batch.campaign_id,
                    batch.platform,
                    &batch.account_id,
                    now,
                )
            })
            .collect();
        let created = ads.iter().map(AdCreated::from).collect();

        self.ads
            .write()
            .await
            .entry(batch.campaign_id.clone())
            .or_default()
            .extend(ads);

        Ok(created)
    }

    /// Reports fixed per-platform metrics. Unrecognised platforms report as meta.
    pub async fn fetch_analytics(
        &self,
        platform: &str,
        account_id: &str,
        campaign_id: Option<&str>,
    ) -> AnalyticsReport {
        let delay = self.simulation.analytics_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let platform = platform.parse::<Platform>().unwrap_or(Platform::Meta);
        tracing::debug!(
            platform = %platform,
            account_id = account_id,
            campaign_id = campaign_id,
            "Fetched analytics"
        );

        AnalyticsReport::from(platform.base_metrics())
    }

    pub async fn campaign(&self, campaign_id: &str) -> Option<Campaign> {
        self.campaigns.read().await.get(campaign_id).cloned()
    }

    pub async fn ads_for_campaign(&self, campaign_id: &str) -> Vec<Ad> {
        self.ads
            .read()
            .await
            .get(campaign_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn campaign_count(&self) -> usize {
        self.campaigns.read().await.len()
    }

    pub async fn ad_count(&self) -> usize {
        self.ads.read().await.values().map(Vec::len).sum()
    }
}
