#![allow(dead_code)]

use ad_platform_gateway::api::{create_router, AppState};
use ad_platform_gateway::clock::MockClock;
use ad_platform_gateway::config::Settings;
use ad_platform_gateway::error::{AppError, Result};
use ad_platform_gateway::models::{AdCopy, CopyBrief};
use ad_platform_gateway::resilience::ScriptedFaults;
use ad_platform_gateway::services::CopyGenerator;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// Copy generator returning a fixed reply.
pub struct StaticCopyGenerator {
    pub configured: bool,
    pub reply: AdCopy,
}

impl StaticCopyGenerator {
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            reply: AdCopy::default(),
        }
    }

    pub fn replying(headlines: &[&str], descriptions: &[&str]) -> Self {
        Self {
            configured: true,
            reply: AdCopy {
                headlines: headlines.iter().map(|s| s.to_string()).collect(),
                descriptions: descriptions.iter().map(|s| s.to_string()).collect(),
            },
        }
    }
}

#[async_trait]
impl CopyGenerator for StaticCopyGenerator {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn generate(&self, _brief: &CopyBrief) -> Result<AdCopy> {
        if !self.configured {
            return Err(AppError::NotConfigured("OpenAI API key not configured".to_string()));
        }
        Ok(self.reply.clone())
    }
}

/// An isolated application with a controllable clock and fault script.
pub struct TestApp {
    pub state: AppState,
    pub clock: MockClock,
    pub faults: Arc<ScriptedFaults>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_settings(Settings::for_tests())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self::build(settings, ScriptedFaults::new(), StaticCopyGenerator::unconfigured())
    }

    pub fn build(settings: Settings, faults: ScriptedFaults, generator: StaticCopyGenerator) -> Self {
        let clock = MockClock::default();
        let faults = Arc::new(faults);
        let state = AppState::from_parts(
            settings,
            Arc::new(clock.clone()),
            faults.clone(),
            Arc::new(generator),
        );

        Self {
            state,
            clock,
            faults,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = create_router(self.state.clone())
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.send(json_request(Method::POST, uri, body)).await
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    /// Connects an account and returns `(access_token, refresh_token)`.
    pub async fn connect(&self, platform: &str, account_id: &str) -> (String, String) {
        let response = self
            .post(
                "/connect-account",
                serde_json::json!({ "platform": platform, "account_id": account_id }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK);
        (
            response.data()["access_token"].as_str().unwrap().to_string(),
            response.data()["refresh_token"].as_str().unwrap().to_string(),
        )
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    pub fn error_code(&self) -> &str {
        self.body["error"]["code"].as_str().unwrap_or_default()
    }

    pub fn error_message(&self) -> &str {
        self.body["error"]["message"].as_str().unwrap_or_default()
    }
}

pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn campaign_body(platform: &str, idempotency_key: Option<&str>) -> Value {
    let mut body = serde_json::json!({
        "platform": platform,
        "account_id": "act_123",
        "campaign_name": "Summer Sale",
        "objective": "LEADS",
        "budget": 1500.0
    });
    if let Some(key) = idempotency_key {
        body["idempotency_key"] = Value::String(key.to_string());
    }
    body
}
