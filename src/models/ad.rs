use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::campaign::generate_id;
use super::Platform;

/// Creative submitted as part of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdDraft {
    pub headline: String,
    pub description: String,
    pub image_base64: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdStatus {
    Created,
}

/// Ad record held by the simulated platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ad {
    pub id: String,
    pub campaign_id: String,
    pub platform: Platform,
    pub account_id: String,
    pub headline: String,
    pub description: String,
    pub image_base64: Option<String>,
    pub status: AdStatus,
    pub created_at: DateTime<Utc>,
}

impl Ad {
    pub fn new(
        draft: &AdDraft,
        campaign_id: &str,
        platform: Platform,
        account_id: &str,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: generate_id("ad", platform, 6),
            campaign_id: campaign_id.to_string(),
            platform,
            account_id: account_id.to_string(),
            headline: draft.headline.clone(),
            description: draft.description.clone(),
            image_base64: draft.image_base64.clone(),
            status: AdStatus::Created,
            created_at,
        }
    }
}

/// Per-ad outcome returned from a batch, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdCreated {
    pub ad_id: String,
    pub status: AdStatus,
}

impl From<&Ad> for AdCreated {
    fn from(ad: &Ad) -> Self {
        Self {
            ad_id: ad.id.clone(),
            status: ad.status,
        }
    }
}
