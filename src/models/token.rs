use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Platform;

/// Stored state for one live access/refresh token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub platform: Platform,
    pub account_id: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Token pair handed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// Outcome of checking an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenValidation {
    pub valid: bool,
    pub expired: bool,
    pub data: Option<TokenRecord>,
}

impl TokenValidation {
    pub fn unknown() -> Self {
        Self {
            valid: false,
            expired: false,
            data: None,
        }
    }

    pub fn expired(record: TokenRecord) -> Self {
        Self {
            valid: false,
            expired: true,
            data: Some(record),
        }
    }

    pub fn valid(record: TokenRecord) -> Self {
        Self {
            valid: true,
            expired: false,
            data: Some(record),
        }
    }
}
