use crate::domain::notification::{DeviceToken, Platform};
use crate::domain::outbox::{OutboxEntry, OutboxStatus};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use time::OffsetDateTime;

/// The externally owned table of registered devices.
#[async_trait]
pub trait DeviceTokenStore: Send + Sync + std::fmt::Debug {
    /// Resolves users to their non-blank device tokens on one platform.
    async fn find_tokens(&self, user_ids: &[String], platform: Platform) -> Result<Vec<DeviceToken>>;

    /// Removes a token the push service reported as permanently invalid.
    async fn delete_token(&self, token: &str) -> Result<()>;
}

/// The queue of notifications written by other components for later delivery.
#[async_trait]
pub trait OutboxStore: Send + Sync + std::fmt::Debug {
    async fn load_due(&self, limit: i64, max_attempts: i32, stale_before: OffsetDateTime) -> Result<Vec<OutboxEntry>>;

    async fn push_preferences(&self, user_ids: &[String]) -> Result<HashMap<String, bool>>;

    /// Returns `false` if the row was already taken by another drain.
    async fn claim(&self, id: &str, stale_before: OffsetDateTime) -> Result<bool>;

    async fn mark_sent(&self, id: &str) -> Result<()>;

    async fn mark_skipped(&self, id: &str, reason: &str) -> Result<()>;

    async fn mark_attempt_failed(&self, id: &str, attempts: i32, status: OutboxStatus, error: &str) -> Result<()>;
}

/// Stands in for both stores when no store URL is configured; every call fails.
#[derive(Debug, Clone)]
pub struct UnconfiguredStore {
    missing: Vec<&'static str>,
}

impl UnconfiguredStore {
    #[must_use]
    pub const fn new(missing: Vec<&'static str>) -> Self {
        Self { missing }
    }

    fn error(&self) -> AppError {
        AppError::MissingStoreConfig(self.missing.clone())
    }
}

#[async_trait]
impl DeviceTokenStore for UnconfiguredStore {
    async fn find_tokens(&self, _user_ids: &[String], _platform: Platform) -> Result<Vec<DeviceToken>> {
        Err(self.error())
    }

    async fn delete_token(&self, _token: &str) -> Result<()> {
        Err(self.error())
    }
}

#[async_trait]
impl OutboxStore for UnconfiguredStore {
    async fn load_due(&self, _limit: i64, _max_attempts: i32, _stale_before: OffsetDateTime) -> Result<Vec<OutboxEntry>> {
        Err(self.error())
    }

    async fn push_preferences(&self, _user_ids: &[String]) -> Result<HashMap<String, bool>> {
        Err(self.error())
    }

    async fn claim(&self, _id: &str, _stale_before: OffsetDateTime) -> Result<bool> {
        Err(self.error())
    }

    async fn mark_sent(&self, _id: &str) -> Result<()> {
        Err(self.error())
    }

    async fn mark_skipped(&self, _id: &str, _reason: &str) -> Result<()> {
        Err(self.error())
    }

    async fn mark_attempt_failed(&self, _id: &str, _attempts: i32, _status: OutboxStatus, _error: &str) -> Result<()> {
        Err(self.error())
    }
}
