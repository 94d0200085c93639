use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::responses::{ApiResponse, ErrorResponse};

/// Network-level fault codes a retry policy can treat as transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultCode {
    ConnectionReset,
    TimedOut,
    HostNotFound,
}

impl FaultCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultCode::ConnectionReset => "ECONNRESET",
            FaultCode::TimedOut => "ETIMEDOUT",
            FaultCode::HostNotFound => "ENOTFOUND",
        }
    }
}

/// Bearer token failures, kept apart so the boundary can answer each one differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Access token required")]
    TokenMissing,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    TokenInvalid,
}

/// A single rejected request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Upstream {
        status: Option<u16>,
        code: Option<FaultCode>,
        message: String,
    },

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    NotConfigured(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Simulated or real downstream outage (HTTP 503 equivalent).
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        AppError::Upstream {
            status: Some(503),
            code: None,
            message: message.into(),
        }
    }

    pub fn network(code: FaultCode, message: impl Into<String>) -> Self {
        AppError::Upstream {
            status: None,
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn campaign_not_found(campaign_id: &str) -> Self {
        AppError::NotFound(format!("Campaign {} not found", campaign_id))
    }

    pub fn fault_code(&self) -> Option<FaultCode> {
        match self {
            AppError::Upstream { code, .. } => *code,
            _ => None,
        }
    }

    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            AppError::Upstream { status, .. } => *status,
            _ => None,
        }
    }

    /// Stable machine-readable code used in responses and metrics labels.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => "VALIDATION_ERROR",
            AppError::Auth(AuthError::TokenMissing) => "TOKEN_MISSING",
            AppError::Auth(AuthError::TokenExpired) => "TOKEN_EXPIRED",
            AppError::Auth(AuthError::TokenInvalid) => "TOKEN_INVALID",
            AppError::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::RateLimited(_) => "RATE_LIMITED",
            AppError::NotConfigured(_) => "NOT_CONFIGURED",
            AppError::Upstream { .. } | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(AuthError::TokenMissing) | AppError::Auth(AuthError::TokenExpired) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Auth(AuthError::TokenInvalid) => StatusCode::FORBIDDEN,
            AppError::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotConfigured(_) | AppError::Upstream { .. } | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        let error = match self {
            AppError::Validation(details) => {
                ErrorResponse::new(code, "Validation failed").with_details(details)
            }
            AppError::Upstream { .. } | AppError::Internal(_) => {
                tracing::error!(error = %self, "Request failed");
                ErrorResponse::new(code, "Internal server error").with_cause(self.to_string())
            }
            AppError::NotConfigured(ref message) => {
                tracing::error!(error = %message, "Collaborator not configured");
                ErrorResponse::new(code, message.clone())
            }
            other => ErrorResponse::new(code, other.to_string()),
        };

        (status, Json(ApiResponse::<()>::error(error))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_errors_map_to_distinct_responses() {
        assert_eq!(AppError::from(AuthError::TokenMissing).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::from(AuthError::TokenExpired).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::from(AuthError::TokenInvalid).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::from(AuthError::TokenExpired).error_code(), "TOKEN_EXPIRED");
    }

    #[test]
    fn test_upstream_accessors() {
        let err = AppError::service_unavailable("Platform temporarily unavailable");
        assert_eq!(err.upstream_status(), Some(503));
        assert_eq!(err.fault_code(), None);
        assert_eq!(err.to_string(), "Platform temporarily unavailable");

        let err = AppError::network(FaultCode::TimedOut, "timed out");
        assert_eq!(err.fault_code(), Some(FaultCode::TimedOut));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_found_message() {
        let err = AppError::campaign_not_found("cmp_meta_123");
        assert_eq!(err.to_string(), "Campaign cmp_meta_123 not found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
