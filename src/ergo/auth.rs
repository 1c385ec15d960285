//! Credential retrieval.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::AccountConfig;
use crate::error::{DriverError, Result};

/// What the login frame needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthDetails {
    pub user_id: u32,
    pub authorize: String,
}

/// Source of fresh credentials.
///
/// `Ok(None)` means no usable session right now (expired, not logged in).
/// Errors are reserved for genuine failures.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn auth_details(&self) -> Result<Option<AuthDetails>>;
}

/// Credentials taken from configuration, optionally with an expiry.
#[derive(Debug, Clone)]
pub struct StaticAuth {
    details: AuthDetails,
    expires_at: Option<DateTime<Utc>>,
}

impl StaticAuth {
    pub fn new(details: AuthDetails, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { details, expires_at }
    }

    pub fn from_config(account: &AccountConfig) -> Self {
        Self::new(
            AuthDetails {
                user_id: account.user_id,
                authorize: account.authorize.clone(),
            },
            account.expires_at,
        )
    }

    /// Credentials valid at `now`, if any.
    pub fn details_at(&self, now: DateTime<Utc>) -> Option<AuthDetails> {
        match self.expires_at {
            Some(expiry) if expiry <= now => {
                debug!("Stored authorization expired at {expiry}");
                None
            }
            _ => Some(self.details.clone()),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn auth_details(&self) -> Result<Option<AuthDetails>> {
        if self.details.authorize.is_empty() {
            return Err(DriverError::auth("no authorize token configured"));
        }
        Ok(self.details_at(Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn details() -> AuthDetails {
        AuthDetails {
            user_id: 1234,
            authorize: "token".to_string(),
        }
    }

    #[test]
    fn test_no_expiry_always_valid() {
        let auth = StaticAuth::new(details(), None);
        assert_eq!(auth.details_at(Utc::now()), Some(details()));
    }

    #[test]
    fn test_expired_returns_none() {
        let now = Utc::now();
        let auth = StaticAuth::new(details(), Some(now - TimeDelta::minutes(1)));
        assert_eq!(auth.details_at(now), None);
    }

    #[tokio::test]
    async fn test_future_expiry_valid() {
        let auth = StaticAuth::new(details(), Some(Utc::now() + TimeDelta::hours(1)));
        assert_eq!(auth.auth_details().await.unwrap(), Some(details()));
    }

    #[tokio::test]
    async fn test_empty_token_is_an_error() {
        let auth = StaticAuth::new(
            AuthDetails {
                user_id: 1,
                authorize: String::new(),
            },
            None,
        );
        assert!(matches!(auth.auth_details().await, Err(DriverError::Auth(_))));
    }
}
