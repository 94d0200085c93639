use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{BackoffSettings, OpenAiSettings};
use crate::error::{AppError, FaultCode, Result};
use crate::models::{AdCopy, CopyBrief};
use crate::observability::{get_metrics, mask_sensitive};
use crate::resilience::{RetryExecutor, RetryPolicy};

const SYSTEM_PROMPT: &str = "You are an expert ad copywriter. Always respond with valid JSON \
containing \"headlines\" and \"descriptions\" arrays.";

const FEW_SHOT_EXAMPLES: &str = "You write short, conversion-focused ad creatives.

Example:
Product: Standing desk
Audience: Home office workers
Tone: Friendly
Headlines:
- Stand Up For Better Workdays
- Your Back Will Thank You
- One Desk. Sitting Or Standing.
Descriptions:
- Switch heights in seconds with a quiet motor and memory presets for every posture
- Built to stay steady at any height so your monitor never wobbles mid-call
- A calmer, healthier home office starts with the desk you already use all day

Example:
Product: Trail running shoes
Audience: Weekend hikers
Tone: Energetic
Headlines:
- Grip Every Trail. Own Every Climb
- Lighter Steps, Longer Adventures
- Built For Mud, Rock And Everything Between
Descriptions:
- Aggressive lugs and a rock plate keep you sure-footed on loose and technical terrain
- Breathable mesh and a cushioned midsole carry you from trailhead to summit in comfort
- Made for runners who would rather be outside than anywhere else";

/// Produces raw ad copy for a brief. Counts are not guaranteed to match the brief.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CopyGenerator: Send + Sync {
    fn is_configured(&self) -> bool;

    async fn generate(&self, brief: &CopyBrief) -> Result<AdCopy>;
}

/// Builds the user prompt for a brief.
pub fn build_prompt(brief: &CopyBrief) -> String {
    let wanted = match (brief.format.wants_headlines(), brief.format.wants_descriptions()) {
        (true, true) => "headlines and descriptions",
        (true, false) => "headlines",
        _ => "descriptions",
    };

    format!(
        "{}\n\nTask: Generate {} {} for:\nProduct: {}\nAudience: {}\nTone: {}\n\n\
         Provide the output in JSON format with \"headlines\" and \"descriptions\" arrays.",
        FEW_SHOT_EXAMPLES, brief.count, wanted, brief.product, brief.audience, brief.tone
    )
}

/// Parses the first `{...}` object in a model reply, or the whole reply if it has none.
pub fn extract_json(reply: &str) -> Result<AdCopy> {
    let reply = reply.trim();
    let candidate = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => reply,
    };

    serde_json::from_str(candidate).map_err(|e| {
        tracing::error!(error = %e, "Failed to parse completion reply");
        AppError::Upstream {
            status: None,
            code: None,
            message: "Invalid JSON response from OpenAI".to_string(),
        }
    })
}

/// Truncates or pads both lists to exactly `brief.count` entries.
pub fn normalize_copy(mut copy: AdCopy, brief: &CopyBrief) -> AdCopy {
    let n = brief.count;

    copy.headlines.truncate(n);
    while copy.headlines.len() < n {
        copy.headlines
            .push(format!("{} - Perfect for {}", brief.product, brief.audience));
    }

    copy.descriptions.truncate(n);
    while copy.descriptions.len() < n {
        copy.descriptions.push(format!(
            "Discover the best {} tailored for {}.",
            brief.product, brief.audience
        ));
    }

    copy
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for an OpenAI-compatible endpoint.
pub struct OpenAiCopyGenerator {
    client: reqwest::Client,
    settings: OpenAiSettings,
}

impl OpenAiCopyGenerator {
    pub fn new(settings: OpenAiSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        match &settings.api_key {
            Some(key) => tracing::info!(
                model = %settings.model,
                api_key = %mask_sensitive(key, 4),
                "Ad copy generator configured"
            ),
            None => tracing::warn!("OPENAI_API_KEY not set. Ad copy generation is disabled."),
        }

        Ok(Self { client, settings })
    }

    fn map_transport_error(error: reqwest::Error) -> AppError {
        if error.is_timeout() {
            AppError::network(FaultCode::TimedOut, error.to_string())
        } else if error.is_connect() {
            AppError::network(FaultCode::ConnectionReset, error.to_string())
        } else {
            AppError::Upstream {
                status: error.status().map(|s| s.as_u16()),
                code: None,
                message: error.to_string(),
            }
        }
    }
}

#[async_trait]
impl CopyGenerator for OpenAiCopyGenerator {
    fn is_configured(&self) -> bool {
        self.settings.api_key.is_some()
    }

    async fn generate(&self, brief: &CopyBrief) -> Result<AdCopy> {
        let Some(api_key) = self.settings.api_key.as_deref() else {
            return Err(AppError::NotConfigured(
                "OpenAI API key not configured".to_string(),
            ));
        };

        let prompt = build_prompt(brief);
        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                status: Some(status.as_u16()),
                code: None,
                message: format!("Completion request failed with status {}: {}", status, body),
            });
        }

        let completion: ChatResponse = response.json().await.map_err(Self::map_transport_error)?;
        let reply = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        extract_json(&reply)
    }
}

/// Generates ad copy with retry and exact-count normalisation.
pub struct AdCopyService {
    generator: Arc<dyn CopyGenerator>,
    retry: RetryExecutor,
    policy: RetryPolicy,
}

impl AdCopyService {
    pub fn new(generator: Arc<dyn CopyGenerator>, backoff: &BackoffSettings) -> Self {
        Self {
            generator,
            retry: RetryExecutor::new(),
            policy: RetryPolicy::from(backoff)
                .with_retryable_codes(&[FaultCode::ConnectionReset, FaultCode::TimedOut]),
        }
    }

    pub fn with_retry_executor(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_configured()
    }

    pub async fn generate(&self, brief: &CopyBrief) -> Result<AdCopy> {
        if !self.generator.is_configured() {
            return Err(AppError::NotConfigured(
                "OpenAI API key not configured".to_string(),
            ));
        }

        tracing::info!(
            product = %brief.product,
            audience = %brief.audience,
            tone = %brief.tone,
            format = %brief.format,
            n = brief.count,
            "Generating ad copy"
        );

        let raw = self
            .retry
            .execute("generate_ad_copy", &self.policy, || self.generator.generate(brief))
            .await?;

        let padded = raw.headlines.len() < brief.count || raw.descriptions.len() < brief.count;
        get_metrics().record_ad_copy_generated(if padded { "padded" } else { "model" });

        Ok(normalize_copy(raw, brief))
    }
}
