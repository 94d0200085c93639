use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::error::{AppError, FieldError, Result};
use crate::models::{AdDraft, CopyBrief, CopyFormat, NewCampaign, Objective, Platform};

/// Flattens validator output into response field errors, sorted by field.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut details: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |err| {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field));
                FieldError::new(field, message)
            })
        })
        .collect();
    details.sort_by(|a, b| a.field.cmp(&b.field));
    details
}

/// Combines derive-level and hand-written checks into one validation error.
fn finish(derived: std::result::Result<(), ValidationErrors>, mut extra: Vec<FieldError>) -> Result<()> {
    let mut details = match derived {
        Ok(()) => Vec::new(),
        Err(errors) => field_errors(&errors),
    };
    details.append(&mut extra);

    if details.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(details))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConnectAccountRequest {
    pub platform: Platform,
    #[validate(length(min = 1, max = 255, message = "account_id is required"))]
    pub account_id: String,
}

impl ConnectAccountRequest {
    pub fn check(&self) -> Result<()> {
        finish(self.validate(), Vec::new())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: Option<String>,
}

impl RefreshTokenRequest {
    pub fn into_token(self) -> Result<String> {
        self.refresh_token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("Refresh token required".to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCampaignRequest {
    pub platform: Platform,
    #[validate(length(min = 1, message = "account_id is required"))]
    pub account_id: String,
    #[validate(length(min = 1, max = 255, message = "campaign_name must be 1-255 characters"))]
    pub campaign_name: String,
    pub objective: Objective,
    pub budget: f64,
    #[validate(length(min = 1, max = 255, message = "idempotency_key must be 1-255 characters"))]
    pub idempotency_key: Option<String>,
}

impl CreateCampaignRequest {
    pub fn check(&self) -> Result<()> {
        let mut extra = Vec::new();
        if !(self.budget.is_finite() && self.budget > 0.0) {
            extra.push(FieldError::new("budget", "budget must be a positive number"));
        }
        if let Some(key) = &self.idempotency_key {
            if !key.is_empty() && key.trim().is_empty() {
                extra.push(FieldError::new("idempotency_key", "idempotency_key must not be blank"));
            }
        }
        finish(self.validate(), extra)
    }

    pub fn to_new_campaign(&self) -> NewCampaign {
        NewCampaign {
            platform: self.platform,
            account_id: self.account_id.clone(),
            name: self.campaign_name.clone(),
            objective: self.objective,
            budget: self.budget,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AdInput {
    #[validate(length(min = 1, max = 255, message = "headline must be 1-255 characters"))]
    pub headline: String,
    #[validate(length(min = 1, max = 1000, message = "description must be 1-1000 characters"))]
    pub description: String,
    pub image_base64: Option<String>,
}

impl From<AdInput> for AdDraft {
    fn from(input: AdInput) -> Self {
        Self {
            headline: input.headline,
            description: input.description,
            image_base64: input.image_base64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BatchCreateAdsRequest {
    pub platform: Platform,
    #[validate(length(min = 1, message = "account_id is required"))]
    pub account_id: String,
    #[validate(length(min = 1, message = "campaign_id is required"))]
    pub campaign_id: String,
    #[validate(length(min = 1, max = 10, message = "ads must contain 1-10 items"))]
    pub ads: Vec<AdInput>,
    #[validate(length(min = 1, message = "batch_id is required"))]
    pub batch_id: String,
}

impl BatchCreateAdsRequest {
    pub fn check(&self) -> Result<()> {
        let mut extra = Vec::new();
        if !self.platform.supports_batch_ads() {
            extra.push(FieldError::new("platform", "platform must be one of: meta, google"));
        }
        for (index, ad) in self.ads.iter().enumerate() {
            if let Err(errors) = ad.validate() {
                extra.extend(field_errors(&errors).into_iter().map(|e| {
                    FieldError::new(format!("ads[{}].{}", index, e.field), e.message)
                }));
            }
        }
        finish(self.validate(), extra)
    }
}

/// Query string of `GET /fetch-analytics`. Fields are optional so that a
/// missing one produces a validation error rather than a rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsQuery {
    pub platform: Option<String>,
    pub account_id: Option<String>,
    pub campaign_id: Option<String>,
}

impl AnalyticsQuery {
    /// Returns `(platform, account_id)` when both are present.
    pub fn required(&self) -> Result<(&str, &str)> {
        let platform = self.platform.as_deref().filter(|p| !p.is_empty());
        let account_id = self.account_id.as_deref().filter(|a| !a.is_empty());

        match (platform, account_id) {
            (Some(platform), Some(account_id)) => Ok((platform, account_id)),
            _ => Err(AppError::BadRequest(
                "Platform and account_id are required".to_string(),
            )),
        }
    }
}

fn default_copy_count() -> usize {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerateAdCopyRequest {
    #[validate(length(min = 1, max = 500, message = "product must be 1-500 characters"))]
    pub product: String,
    #[validate(length(min = 1, max = 500, message = "audience must be 1-500 characters"))]
    pub audience: String,
    #[validate(length(min = 1, max = 100, message = "tone must be 1-100 characters"))]
    pub tone: String,
    pub format: CopyFormat,
    #[serde(default = "default_copy_count")]
    #[validate(range(min = 1, max = 10, message = "n must be between 1 and 10"))]
    pub n: usize,
}

impl GenerateAdCopyRequest {
    pub fn check(&self) -> Result<()> {
        finish(self.validate(), Vec::new())
    }

    pub fn into_brief(self) -> CopyBrief {
        CopyBrief {
            product: self.product,
            audience: self.audience,
            tone: self.tone,
            format: self.format,
            count: self.n,
        }
    }
}
