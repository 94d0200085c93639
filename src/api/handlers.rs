use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::api::middleware::bearer_token;
use crate::api::requests::{
    AnalyticsQuery, BatchCreateAdsRequest, ConnectAccountRequest, CreateCampaignRequest,
    GenerateAdCopyRequest, RefreshTokenRequest,
};
use crate::api::responses::{
    AnalyticsResponse, ApiResponse, BatchAdsResponse, HealthResponse, TokenInfoResponse,
    TokenResponse,
};
use crate::error::{AppError, Result};
use crate::idempotency::IdempotentOutcome;
use crate::models::{AdCopy, AdDraft, CampaignCreated, TokenPair};
use crate::observability::AggregatedHealth;
use crate::services::NewAdBatch;

use super::routes::AppState;

pub const IDEMPOTENT_REPLAYED: &str = "idempotent-replayed";
pub const IDEMPOTENCY_KEY: &str = "idempotency-key";

fn parse_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// 201 for a fresh result; 200 plus `Idempotent-Replayed: true` for a replay.
fn created_or_replayed<T: Serialize>(outcome: IdempotentOutcome<T>) -> Response {
    match outcome {
        IdempotentOutcome::Fresh(data) => {
            (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
        }
        IdempotentOutcome::Replayed(data) => (
            StatusCode::OK,
            [(IDEMPOTENT_REPLAYED, "true")],
            Json(ApiResponse::success(data)),
        )
            .into_response(),
    }
}

/// Health check endpoint.
pub async fn health_check() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    }))
}

pub async fn detailed_health_check(State(state): State<AppState>) -> Json<ApiResponse<AggregatedHealth>> {
    Json(ApiResponse::success(state.health_checker.check_all().await))
}

/// Prometheus scrape endpoint.
pub async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match &state.metrics_handle {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "Metrics recorder not installed").into_response(),
    }
}

pub async fn not_found() -> AppError {
    AppError::NotFound("Endpoint not found".to_string())
}

// ============================================================================
// Account Handlers
// ============================================================================

/// Connects an ad account and issues its first token pair.
pub async fn connect_account(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ConnectAccountRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<TokenResponse>>> {
    let request = parse_body(payload)?;
    request.check()?;

    state
        .gateway
        .authorize_account(request.platform, &request.account_id)
        .await;
    let pair = state.tokens.issue(request.platform, &request.account_id).await;

    Ok(Json(ApiResponse::success(TokenResponse::connected(
        request.platform,
        request.account_id,
        pair,
    ))))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<TokenPair>>> {
    let refresh_token = parse_body(payload)?.into_token()?;
    let pair = state.tokens.refresh(&refresh_token).await?;
    Ok(Json(ApiResponse::success(pair)))
}

pub async fn token_info(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<TokenInfoResponse>>> {
    let record = state.tokens.authenticate(bearer_token(&headers)).await?;
    let now = state.clock.now();
    Ok(Json(ApiResponse::success(TokenInfoResponse::new(record, now))))
}

// ============================================================================
// Campaign Handlers
// ============================================================================

/// Creates a campaign. The idempotency key comes from the body, or the
/// `Idempotency-Key` header when the body has none. A blank header counts as absent.
pub async fn create_campaign(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<CreateCampaignRequest>, JsonRejection>,
) -> Result<Response> {
    let request = parse_body(payload)?;
    request.check()?;
    state.rate_limiter.check_platform(request.platform)?;

    let idempotency_key = request.idempotency_key.clone().or_else(|| {
        headers
            .get(IDEMPOTENCY_KEY)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    });

    let outcome: IdempotentOutcome<CampaignCreated> = state
        .gateway
        .create_campaign(request.to_new_campaign(), idempotency_key.as_deref())
        .await?;

    Ok(created_or_replayed(outcome))
}

pub async fn batch_create_ads(
    State(state): State<AppState>,
    payload: std::result::Result<Json<BatchCreateAdsRequest>, JsonRejection>,
) -> Result<Response> {
    let request = parse_body(payload)?;
    request.check()?;
    state.rate_limiter.check_platform(request.platform)?;

    let campaign_id = request.campaign_id.clone();
    let batch_id = request.batch_id.clone();
    let batch = NewAdBatch {
        platform: request.platform,
        account_id: request.account_id,
        campaign_id: request.campaign_id,
        ads: request.ads.into_iter().map(AdDraft::from).collect(),
        batch_id: request.batch_id,
    };

    let outcome = state.gateway.batch_create_ads(batch).await?;

    Ok(created_or_replayed(outcome.map(|ads| BatchAdsResponse {
        campaign_id,
        batch_id,
        ads,
    })))
}

// ============================================================================
// Analytics & Creative Handlers
// ============================================================================

pub async fn fetch_analytics(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<ApiResponse<AnalyticsResponse>>> {
    let (platform, account_id) = query.required()?;

    let metrics = state
        .gateway
        .fetch_analytics(platform, account_id, query.campaign_id.as_deref())
        .await;

    Ok(Json(ApiResponse::success(AnalyticsResponse {
        platform: platform.to_string(),
        account_id: account_id.to_string(),
        campaign_id: query.campaign_id.clone(),
        metrics,
    })))
}

pub async fn generate_ad_copy(
    State(state): State<AppState>,
    payload: std::result::Result<Json<GenerateAdCopyRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<AdCopy>>> {
    let request = parse_body(payload)?;
    request.check()?;

    let brief = request.into_brief();
    let copy = state.ad_copy.generate(&brief).await?;
    Ok(Json(ApiResponse::success(copy)))
}
