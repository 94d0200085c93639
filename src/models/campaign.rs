use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Platform;

/// Campaign optimisation goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Objective {
    Leads,
    Traffic,
    Awareness,
}

/// Parameters for creating a campaign on a platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCampaign {
    pub platform: Platform,
    pub account_id: String,
    pub name: String,
    pub objective: Objective,
    pub budget: f64,
}

/// Campaign record held by the simulated platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub platform: Platform,
    pub account_id: String,
    pub name: String,
    pub objective: Objective,
    pub budget: f64,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Builds a campaign with a fresh platform-prefixed identifier.
    pub fn new(request: NewCampaign, created_at: DateTime<Utc>) -> Self {
        Self {
            id: generate_id("cmp", request.platform, 8),
            platform: request.platform,
            account_id: request.account_id,
            name: request.name,
            objective: request.objective,
            budget: request.budget,
            created_at,
        }
    }
}

/// Result returned to the caller once a campaign exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignCreated {
    pub campaign_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Campaign> for CampaignCreated {
    fn from(campaign: &Campaign) -> Self {
        Self {
            campaign_id: campaign.id.clone(),
            created_at: campaign.created_at,
        }
    }
}

/// `<prefix>_<platform>_<hex>` with `bytes` random bytes of entropy.
pub(crate) fn generate_id(prefix: &str, platform: Platform, bytes: usize) -> String {
    let random: Vec<u8> = (0..bytes).map(|_| rand::random::<u8>()).collect();
    format!("{}_{}_{}", prefix, platform, hex::encode(random))
}
