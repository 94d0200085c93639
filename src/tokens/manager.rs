use chrono::Duration;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::config::TokenSettings;
use crate::error::{AppError, AuthError, Result};
use crate::models::{Platform, TokenPair, TokenRecord, TokenValidation};
use crate::observability::{get_metrics, mask_token};

const TOKEN_BYTES: usize = 32;

/// Live token records, indexed by access token and by refresh token.
#[derive(Debug, Default)]
struct TokenTable {
    by_access: HashMap<String, TokenRecord>,
    access_by_refresh: HashMap<String, String>,
}

impl TokenTable {
    fn insert(&mut self, record: TokenRecord) {
        self.access_by_refresh
            .insert(record.refresh_token.clone(), record.access_token.clone());
        self.by_access.insert(record.access_token.clone(), record);
    }

    fn take_by_refresh(&mut self, refresh_token: &str) -> Option<TokenRecord> {
        let access_token = self.access_by_refresh.remove(refresh_token)?;
        self.by_access.remove(&access_token)
    }
}

/// Issues, validates and rotates bearer token pairs.
pub struct TokenLifecycleManager {
    table: RwLock<TokenTable>,
    lifetime: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenLifecycleManager {
    pub fn new(lifetime_seconds: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            table: RwLock::new(TokenTable::default()),
            lifetime: Duration::seconds(lifetime_seconds),
            clock,
        }
    }

    pub fn from_settings(settings: &TokenSettings, clock: Arc<dyn Clock>) -> Self {
        Self::new(settings.lifetime_seconds, clock)
    }

    pub fn lifetime_seconds(&self) -> i64 {
        self.lifetime.num_seconds()
    }

    fn generate_token() -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    fn mint(&self, platform: Platform, account_id: &str) -> TokenRecord {
        let issued_at = self.clock.now();
        TokenRecord {
            access_token: Self::generate_token(),
            refresh_token: Self::generate_token(),
            platform,
            account_id: account_id.to_string(),
            issued_at,
            expires_at: issued_at + self.lifetime,
        }
    }

    fn pair(&self, record: &TokenRecord) -> TokenPair {
        TokenPair {
            access_token: record.access_token.clone(),
            refresh_token: record.refresh_token.clone(),
            expires_in: self.lifetime_seconds(),
        }
    }

    /// Creates and stores a fresh token pair for an account.
    pub async fn issue(&self, platform: Platform, account_id: &str) -> TokenPair {
        let record = self.mint(platform, account_id);
        let pair = self.pair(&record);

        self.table.write().await.insert(record);

        get_metrics().record_token_issued(platform.as_str());
        tracing::info!(
            platform = %platform,
            account_id = account_id,
            expires_in = pair.expires_in,
            "Generated tokens"
        );

        pair
    }

    pub async fn validate(&self, access_token: &str) -> TokenValidation {
        let Some(record) = self.lookup(access_token).await else {
            tracing::warn!(access_token = %mask_token(access_token), "Token not found");
            return TokenValidation::unknown();
        };

        if record.is_expired_at(self.clock.now()) {
            tracing::warn!(
                access_token = %mask_token(access_token),
                expired_at = %record.expires_at.to_rfc3339(),
                "Token expired"
            );
            return TokenValidation::expired(record);
        }

        TokenValidation::valid(record)
    }

    /// Validates a bearer token from the boundary, mapping each failure to its own error.
    pub async fn authenticate(&self, access_token: Option<&str>) -> Result<TokenRecord> {
        let Some(access_token) = access_token.filter(|t| !t.is_empty()) else {
            get_metrics().record_token_rejected("missing");
            return Err(AuthError::TokenMissing.into());
        };

        match self.validate(access_token).await {
            TokenValidation {
                valid: true,
                data: Some(record),
                ..
            } => Ok(record),
            TokenValidation { expired: true, .. } => {
                get_metrics().record_token_rejected("expired");
                Err(AuthError::TokenExpired.into())
            }
            _ => {
                get_metrics().record_token_rejected("invalid");
                Err(AuthError::TokenInvalid.into())
            }
        }
    }

    /// Replaces the pair owning `refresh_token` with a brand-new one for the
    /// same platform and account. The old pair stops validating immediately.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let mut table = self.table.write().await;

        let Some(previous) = table.take_by_refresh(refresh_token) else {
            drop(table);
            get_metrics().record_token_rejected("unknown_refresh_token");
            tracing::error!("Refresh token not found");
            return Err(AppError::InvalidRefreshToken);
        };

        let record = self.mint(previous.platform, &previous.account_id);
        let pair = self.pair(&record);
        table.insert(record);
        drop(table);

        get_metrics().record_token_refreshed(previous.platform.as_str());
        tracing::info!(
            platform = %previous.platform,
            account_id = %previous.account_id,
            "Refreshed access token"
        );

        Ok(pair)
    }

    pub async fn lookup(&self, access_token: &str) -> Option<TokenRecord> {
        self.table.read().await.by_access.get(access_token).cloned()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.by_access.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    fn manager() -> (TokenLifecycleManager, MockClock) {
        let clock = MockClock::default();
        (TokenLifecycleManager::new(120, Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_tokens_are_hex_and_distinct() {
        let (manager, _) = manager();
        let pair = manager.issue(Platform::Meta, "account_123").await;

        assert_eq!(pair.access_token.len(), TOKEN_BYTES * 2);
        assert!(pair.access_token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(pair.access_token, pair.refresh_token);
        assert_eq!(pair.expires_in, 120);
    }

    #[tokio::test]
    async fn test_refresh_keeps_indexes_consistent() {
        let (manager, _) = manager();
        let first = manager.issue(Platform::Google, "a").await;
        let _other = manager.issue(Platform::Meta, "b").await;

        let second = manager.refresh(&first.refresh_token).await.unwrap();

        assert_eq!(manager.len().await, 2);
        let table = manager.table.read().await;
        assert_eq!(table.access_by_refresh.len(), 2);
        assert!(!table.access_by_refresh.contains_key(&first.refresh_token));
        assert_eq!(
            table.access_by_refresh.get(&second.refresh_token),
            Some(&second.access_token)
        );
    }

    #[tokio::test]
    async fn test_refresh_token_is_single_use() {
        let (manager, _) = manager();
        let pair = manager.issue(Platform::Tiktok, "acc").await;

        manager.refresh(&pair.refresh_token).await.unwrap();
        let err = manager.refresh(&pair.refresh_token).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn test_expiry_boundary_is_exclusive() {
        let (manager, clock) = manager();
        let pair = manager.issue(Platform::Meta, "acc").await;

        clock.advance(Duration::seconds(120));
        assert!(manager.validate(&pair.access_token).await.valid);

        clock.advance(Duration::milliseconds(1));
        let validation = manager.validate(&pair.access_token).await;
        assert!(!validation.valid);
        assert!(validation.expired);
    }

    #[tokio::test]
    async fn test_authenticate_distinguishes_failures() {
        let (manager, clock) = manager();
        let pair = manager.issue(Platform::Meta, "acc").await;

        assert!(manager.authenticate(Some(&pair.access_token)).await.is_ok());
        assert!(matches!(
            manager.authenticate(None).await,
            Err(AppError::Auth(AuthError::TokenMissing))
        ));
        assert!(matches!(
            manager.authenticate(Some("nope")).await,
            Err(AppError::Auth(AuthError::TokenInvalid))
        ));

        clock.advance(Duration::seconds(121));
        assert!(matches!(
            manager.authenticate(Some(&pair.access_token)).await,
            Err(AppError::Auth(AuthError::TokenExpired))
        ));
    }
}
